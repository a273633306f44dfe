//! Query expressions and their compilation to qastle, the linear query
//! text understood by ServiceX code generators.

pub mod ast;
pub mod compiler;
pub mod error;
pub mod parse;
pub mod qastle;
pub mod stream;

pub use ast::{BinOp, BoolOp, CmpOp, Constant, Expr, UnaryOp};
pub use compiler::{CompiledQuery, DirectFormat, LocalFormat, QueryCompiler, Terminal};
pub use error::CompilationError;
pub use parse::parse_lambda;
pub use qastle::to_qastle;
pub use stream::ObjectStream;
