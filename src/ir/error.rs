
use std::error::Error;

use parse_display::Display;

use super::{ StmtId };

// ------------------------------------------------------------------------------------------------
// IrErrorKind
// ------------------------------------------------------------------------------------------------

/// The kinds of malformed-IR errors.
#[derive(Debug, Display, PartialEq, Eq, Copy, Clone)]
pub enum IrErrorKind {
	/// A block-bearing statement kind with no defined scan handling.
	#[display("container statement has no scan handling")]
	UnhandledContainer,

	/// A loop binds a slot which an enclosing loop already binds.
	#[display("slot re-bound by a nested loop")]
	NestedLoopBinding,
}

// ------------------------------------------------------------------------------------------------
// IrError
// ------------------------------------------------------------------------------------------------

/// The malformed-IR error type. These indicate a bug in an earlier pass, not bad input.
#[derive(Debug, Display, PartialEq, Eq, Copy, Clone)]
#[display("malformed IR at {stmt:?}: {kind}")]
pub struct IrError {
	/// statement at which the violation was detected.
	pub stmt: StmtId,
	/// kind of error.
	pub kind: IrErrorKind,
}

impl Error for IrError {}

impl IrError {
	/// Shorthand constructors.
	pub fn unhandled_container(stmt: StmtId) -> IrError {
		IrError { stmt, kind: IrErrorKind::UnhandledContainer }
	}

	/// Ditto.
	pub fn nested_loop_binding(stmt: StmtId) -> IrError {
		IrError { stmt, kind: IrErrorKind::NestedLoopBinding }
	}
}

// ------------------------------------------------------------------------------------------------
// IrResult
// ------------------------------------------------------------------------------------------------

/// Alias for a `Result` with an `IrError` as its error type.
pub type IrResult<T> = Result<T, IrError>;
