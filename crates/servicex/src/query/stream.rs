//! Fluent construction of query trees.

use super::ast::Expr;
use super::error::CompilationError;
use super::parse::parse_lambda;

/// A sequence of events or objects, built up one operator at a time.
///
/// Each operator returns a new stream; the tree is plain data, so cloning a
/// stream to fork a query is cheap and never shares state.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectStream {
    expr: Expr,
}

impl ObjectStream {
    /// The root of every query: all events of the dataset.
    pub fn event_dataset() -> Self {
        Self {
            expr: Expr::call("EventDataset", vec![]),
        }
    }

    pub fn from_expr(expr: Expr) -> Self {
        Self { expr }
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn into_expr(self) -> Expr {
        self.expr
    }

    fn apply(self, operator: &str, lambda: &str) -> Result<Self, CompilationError> {
        let func = parse_lambda(lambda).map_err(|err| match err {
            CompilationError::Syntax { offset: 0, .. }
                if !lambda.trim_start().starts_with("lambda") =>
            {
                CompilationError::ExpectedLambda {
                    operator: operator.to_string(),
                }
            }
            other => other,
        })?;
        Ok(self.apply_expr(operator, func))
    }

    fn apply_expr(self, operator: &str, func: Expr) -> Self {
        Self {
            expr: Expr::call(operator, vec![self.expr, func]),
        }
    }

    /// Maps each element through `lambda`.
    pub fn select(self, lambda: &str) -> Result<Self, CompilationError> {
        self.apply("Select", lambda)
    }

    /// Maps each element to a sequence and flattens the result.
    pub fn select_many(self, lambda: &str) -> Result<Self, CompilationError> {
        self.apply("SelectMany", lambda)
    }

    /// Keeps elements for which `lambda` is true.
    pub fn where_(self, lambda: &str) -> Result<Self, CompilationError> {
        self.apply("Where", lambda)
    }

    /// `select` with an already built lambda.
    pub fn select_expr(self, lambda: Expr) -> Result<Self, CompilationError> {
        if !matches!(lambda, Expr::Lambda { .. }) {
            return Err(CompilationError::ExpectedLambda {
                operator: "Select".to_string(),
            });
        }
        Ok(self.apply_expr("Select", lambda))
    }

    pub fn first(self) -> Self {
        Self {
            expr: Expr::call("First", vec![self.expr]),
        }
    }

    pub fn count(self) -> Self {
        Self {
            expr: Expr::call("Count", vec![self.expr]),
        }
    }

    fn terminal(self, name: &str, mut extra: Vec<Expr>) -> Expr {
        let mut args = vec![self.expr];
        args.append(&mut extra);
        Expr::call(name, args)
    }

    /// Parquet files written by the backend, with the given column names.
    pub fn result_parquet<S: AsRef<str>>(self, columns: &[S]) -> Expr {
        self.terminal("ResultParquet", vec![Expr::string_list(columns)])
    }

    /// ROOT files holding a TTree written by the backend.
    pub fn result_ttree<S: AsRef<str>>(
        self,
        columns: &[S],
        tree_name: &str,
        file_name: &str,
    ) -> Expr {
        self.terminal(
            "ResultTTree",
            vec![
                Expr::string_list(columns),
                Expr::string(tree_name),
                Expr::string(file_name),
            ],
        )
    }

    pub fn result_pandas_df<S: AsRef<str>>(self, columns: &[S]) -> Expr {
        self.terminal("ResultPandasDF", vec![Expr::string_list(columns)])
    }

    pub fn result_awkward_array<S: AsRef<str>>(self, columns: &[S]) -> Expr {
        self.terminal("ResultAwkwardArray", vec![Expr::string_list(columns)])
    }
}

impl Default for ObjectStream {
    fn default() -> Self {
        Self::event_dataset()
    }
}
