//! Terminal-call rewriting and compilation of a query tree to qastle.

use super::ast::Expr;
use super::error::CompilationError;
use super::qastle::to_qastle;
use crate::models::ResultFormat;

/// Formats the backend writes directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectFormat {
    Parquet,
    TTree,
}

/// Formats assembled client side from files the backend writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalFormat {
    PandasDataFrame,
    AwkwardArray,
}

/// The materialization named by the outermost call of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminal {
    Direct(DirectFormat),
    LocallyExecuted(LocalFormat),
    Unknown(String),
}

impl Terminal {
    pub fn classify(name: &str) -> Self {
        match name {
            "ResultParquet" => Terminal::Direct(DirectFormat::Parquet),
            "ResultTTree" => Terminal::Direct(DirectFormat::TTree),
            "ResultPandasDF" => Terminal::LocallyExecuted(LocalFormat::PandasDataFrame),
            "ResultAwkwardArray" => Terminal::LocallyExecuted(LocalFormat::AwkwardArray),
            other => Terminal::Unknown(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Terminal::Direct(DirectFormat::Parquet) => "ResultParquet",
            Terminal::Direct(DirectFormat::TTree) => "ResultTTree",
            Terminal::LocallyExecuted(LocalFormat::PandasDataFrame) => "ResultPandasDF",
            Terminal::LocallyExecuted(LocalFormat::AwkwardArray) => "ResultAwkwardArray",
            Terminal::Unknown(name) => name,
        }
    }
}

/// Output of [`QueryCompiler::compile`].
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    /// Qastle text sent as the request selection.
    pub text: String,
    pub terminal: Terminal,
    /// Format the backend has to write, when the terminal implies one.
    pub result_format: Option<ResultFormat>,
    /// Set when the result still has to be assembled locally.
    pub materialization: Option<LocalFormat>,
}

/// Order in which formats are tried for locally executed terminals.
const LOCAL_FORMAT_PREFERENCE: &[ResultFormat] = &[ResultFormat::Parquet, ResultFormat::RootFile];

/// Compiles query trees for one code generator.
#[derive(Debug, Clone)]
pub struct QueryCompiler {
    codegen: String,
    supported: Vec<ResultFormat>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamShape {
    Tuple(usize),
    Named,
    Single,
}

impl QueryCompiler {
    pub fn new(codegen: impl Into<String>, supported: Vec<ResultFormat>) -> Self {
        Self {
            codegen: codegen.into(),
            supported,
        }
    }

    /// Compiler with the output formats known for a code generator.
    pub fn for_codegen(codegen: &str) -> Self {
        let supported = match codegen {
            "uproot" => vec![ResultFormat::Parquet, ResultFormat::RootFile],
            "atlasr21" | "atlasr22" | "xaod" | "cms_run1_aod" => vec![ResultFormat::RootFile],
            _ => vec![ResultFormat::Parquet, ResultFormat::RootFile],
        };
        Self::new(codegen, supported)
    }

    pub fn codegen(&self) -> &str {
        &self.codegen
    }

    pub fn supported_formats(&self) -> &[ResultFormat] {
        &self.supported
    }

    /// Rewrites the terminal call of `expr` and renders the result as qastle.
    pub fn compile(&self, expr: &Expr) -> Result<CompiledQuery, CompilationError> {
        if !matches!(expr, Expr::Call { .. }) {
            return Err(CompilationError::NotACall);
        }
        let Some((name, args)) = operator_call(expr) else {
            return Ok(self.passthrough(expr, Terminal::Unknown(String::new())));
        };

        let terminal = Terminal::classify(name);
        let (source, result_format, materialization) = match &terminal {
            Terminal::Unknown(_) => return Ok(self.passthrough(expr, terminal.clone())),
            Terminal::Direct(DirectFormat::Parquet) => {
                self.require(ResultFormat::Parquet)?;
                let stream = stream_arg(&terminal, &args)?;
                let names = column_names(&terminal, args.get(1).copied())?;
                (
                    select_columns(stream, &names)?,
                    ResultFormat::Parquet,
                    None,
                )
            }
            Terminal::Direct(DirectFormat::TTree) => {
                self.require(ResultFormat::RootFile)?;
                if args.len() < 2 {
                    return Err(missing(&terminal, 2, args.len()));
                }
                column_names(&terminal, Some(args[1]))?;
                (expr.clone(), ResultFormat::RootFile, None)
            }
            Terminal::LocallyExecuted(local) => {
                let format = ResultFormat::negotiate(LOCAL_FORMAT_PREFERENCE, &self.supported)
                    .ok_or_else(|| CompilationError::NoSupportedFormat {
                        codegen: self.codegen.clone(),
                    })?;
                let stream = stream_arg(&terminal, &args)?;
                let names = column_names(&terminal, args.get(1).copied())?;
                let source = match format {
                    ResultFormat::Parquet => {
                        if stream_shape(stream) == StreamShape::Named {
                            stream.clone()
                        } else {
                            select_columns(stream, &names)?
                        }
                    }
                    ResultFormat::RootFile => {
                        if names.is_empty() {
                            stream.clone()
                        } else {
                            let columns = args
                                .get(1)
                                .map(|c| (*c).clone())
                                .unwrap_or_else(|| Expr::string_list(&names));
                            Expr::call(
                                "ResultTTree",
                                vec![
                                    stream.clone(),
                                    columns,
                                    Expr::string("treeme"),
                                    Expr::string("junk.root"),
                                ],
                            )
                        }
                    }
                };
                (source, format, Some(*local))
            }
        };

        let text = to_qastle(&source);
        log::debug!("Compiled {} query for {}: {}", terminal.name(), self.codegen, text);
        Ok(CompiledQuery {
            text,
            terminal,
            result_format: Some(result_format),
            materialization,
        })
    }

    fn passthrough(&self, expr: &Expr, terminal: Terminal) -> CompiledQuery {
        CompiledQuery {
            text: to_qastle(expr),
            terminal,
            result_format: None,
            materialization: None,
        }
    }

    fn require(&self, format: ResultFormat) -> Result<(), CompilationError> {
        if self.supported.contains(&format) {
            Ok(())
        } else {
            Err(CompilationError::NoSupportedFormat {
                codegen: self.codegen.clone(),
            })
        }
    }
}

/// Splits a call into operator name and arguments, receiver first for
/// method-style calls.
pub(crate) fn operator_call(expr: &Expr) -> Option<(&str, Vec<&Expr>)> {
    let Expr::Call { func, args } = expr else {
        return None;
    };
    match func.as_ref() {
        Expr::Name(name) => Some((name.as_str(), args.iter().collect())),
        Expr::Attribute { value, attr } => Some((
            attr.as_str(),
            std::iter::once(value.as_ref()).chain(args.iter()).collect(),
        )),
        _ => None,
    }
}

fn missing(terminal: &Terminal, expected: usize, found: usize) -> CompilationError {
    CompilationError::MissingArgument {
        terminal: terminal.name().to_string(),
        expected,
        found,
    }
}

fn stream_arg<'a>(terminal: &Terminal, args: &[&'a Expr]) -> Result<&'a Expr, CompilationError> {
    args.first().copied().ok_or_else(|| missing(terminal, 1, 0))
}

fn column_names(terminal: &Terminal, arg: Option<&Expr>) -> Result<Vec<String>, CompilationError> {
    let invalid = || CompilationError::InvalidColumnNames {
        terminal: terminal.name().to_string(),
    };
    match arg {
        None => Ok(Vec::new()),
        Some(Expr::List(items)) | Some(Expr::Tuple(items)) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string).ok_or_else(invalid))
            .collect(),
        Some(other) => other
            .as_str()
            .map(|name| vec![name.to_string()])
            .ok_or_else(invalid),
    }
}

/// What a single element of `stream` looks like, judged from its last `Select`.
fn stream_shape(stream: &Expr) -> StreamShape {
    match operator_call(stream) {
        Some(("Select", args)) if args.len() == 2 => match args[1] {
            Expr::Lambda { body, .. } => match body.as_ref() {
                Expr::Tuple(items) => StreamShape::Tuple(items.len()),
                Expr::Dict { .. } => StreamShape::Named,
                _ => StreamShape::Single,
            },
            _ => StreamShape::Single,
        },
        Some(("Where", args)) if !args.is_empty() => stream_shape(args[0]),
        _ => StreamShape::Single,
    }
}

/// Wraps `stream` in `Select(stream, lambda x: {name: value, ...})`.
fn select_columns(stream: &Expr, names: &[String]) -> Result<Expr, CompilationError> {
    if names.is_empty() {
        return Ok(stream.clone());
    }
    let values = match stream_shape(stream) {
        StreamShape::Tuple(width) => {
            if names.len() > width {
                return Err(CompilationError::ColumnCountMismatch {
                    names: names.len(),
                    width,
                });
            }
            (0..names.len())
                .map(|i| Expr::subscript(Expr::name("x"), Expr::int(i as i64)))
                .collect()
        }
        StreamShape::Named | StreamShape::Single => {
            if names.len() > 1 {
                return Err(CompilationError::AmbiguousColumns { count: names.len() });
            }
            vec![Expr::name("x")]
        }
    };
    let dict = Expr::Dict {
        keys: names.iter().map(|n| Expr::string(n.as_str())).collect(),
        values,
    };
    Ok(Expr::call(
        "Select",
        vec![stream.clone(), Expr::lambda(&["x"], dict)],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parse::parse_lambda;

    fn events() -> Expr {
        Expr::call("EventDataset", vec![])
    }

    fn select(source: Expr, lambda: &str) -> Expr {
        Expr::call("Select", vec![source, parse_lambda(lambda).unwrap()])
    }

    fn uproot() -> QueryCompiler {
        QueryCompiler::for_codegen("uproot")
    }

    #[test]
    fn test_single_column_maps_whole_value() {
        let stream = select(events(), "lambda e: e.met");
        let query = Expr::call(
            "ResultPandasDF",
            vec![stream, Expr::string_list(&["col1"])],
        );
        let compiled = uproot().compile(&query).unwrap();
        assert_eq!(
            compiled.text,
            "(Select (Select (call EventDataset) (lambda (list e) (attr e 'met'))) \
             (lambda (list x) (dict (list 'col1') (list x))))"
        );
        assert_eq!(compiled.result_format, Some(ResultFormat::Parquet));
        assert_eq!(compiled.materialization, Some(LocalFormat::PandasDataFrame));
    }

    #[test]
    fn test_tuple_columns_map_to_indices() {
        let stream = select(events(), "lambda e: (e.pt, e.eta)");
        let query = Expr::call(
            "ResultParquet",
            vec![stream, Expr::string_list(&["pt", "eta"])],
        );
        let compiled = uproot().compile(&query).unwrap();
        assert!(compiled.text.ends_with(
            "(lambda (list x) (dict (list 'pt' 'eta') (list (subscript x 0) (subscript x 1)))))"
        ));
        assert_eq!(compiled.materialization, None);
    }

    #[test]
    fn test_direct_without_columns_passes_stream_through() {
        let stream = select(events(), "lambda e: e.met");
        let expected = to_qastle(&stream);
        let query = Expr::call("ResultParquet", vec![stream, Expr::List(vec![])]);
        let compiled = uproot().compile(&query).unwrap();
        assert_eq!(compiled.text, expected);
        assert_eq!(compiled.result_format, Some(ResultFormat::Parquet));
    }

    #[test]
    fn test_multiple_names_on_single_value_is_ambiguous() {
        let stream = select(events(), "lambda e: e.met");
        let query = Expr::call(
            "ResultParquet",
            vec![stream, Expr::string_list(&["a", "b"])],
        );
        assert_eq!(
            uproot().compile(&query).unwrap_err(),
            CompilationError::AmbiguousColumns { count: 2 }
        );
    }

    #[test]
    fn test_fewer_names_than_tuple_values_take_leading_indices() {
        let stream = select(events(), "lambda e: (e.pt, e.eta)");
        let query = Expr::call("ResultParquet", vec![stream, Expr::string_list(&["pt"])]);
        let compiled = uproot().compile(&query).unwrap();
        assert!(compiled
            .text
            .ends_with("(lambda (list x) (dict (list 'pt') (list (subscript x 0)))))"));
    }

    #[test]
    fn test_more_names_than_tuple_values() {
        let stream = select(events(), "lambda e: (e.pt, e.eta)");
        let query = Expr::call(
            "ResultParquet",
            vec![stream, Expr::string_list(&["pt", "eta", "phi"])],
        );
        assert_eq!(
            uproot().compile(&query).unwrap_err(),
            CompilationError::ColumnCountMismatch { names: 3, width: 2 }
        );
    }

    #[test]
    fn test_column_names_must_be_strings() {
        let query = Expr::call("ResultParquet", vec![events(), Expr::int(3)]);
        assert!(matches!(
            uproot().compile(&query),
            Err(CompilationError::InvalidColumnNames { .. })
        ));
    }

    #[test]
    fn test_root_only_backend_wraps_local_terminal_in_ttree() {
        let stream = select(events(), "lambda e: e.met");
        let query = Expr::call(
            "ResultAwkwardArray",
            vec![stream, Expr::string_list(&["met"])],
        );
        let compiled = QueryCompiler::for_codegen("atlasr21").compile(&query).unwrap();
        assert!(compiled.text.starts_with("(call ResultTTree (Select"));
        assert!(compiled.text.ends_with("(list 'met') 'treeme' 'junk.root')"));
        assert_eq!(compiled.result_format, Some(ResultFormat::RootFile));
        assert_eq!(compiled.materialization, Some(LocalFormat::AwkwardArray));
    }

    #[test]
    fn test_named_stream_passes_through_for_local_parquet() {
        let stream = select(events(), "lambda e: {'met': e.met}");
        let expected = to_qastle(&stream);
        let query = Expr::call(
            "ResultPandasDF",
            vec![stream, Expr::List(vec![])],
        );
        assert_eq!(uproot().compile(&query).unwrap().text, expected);
    }

    #[test]
    fn test_unknown_terminal_passes_through() {
        let query = select(events(), "lambda e: e.met");
        let compiled = uproot().compile(&query).unwrap();
        assert_eq!(compiled.text, to_qastle(&query));
        assert_eq!(compiled.terminal, Terminal::Unknown("Select".to_string()));
        assert_eq!(compiled.result_format, None);
    }

    #[test]
    fn test_root_must_be_call() {
        assert_eq!(
            uproot().compile(&Expr::name("e")).unwrap_err(),
            CompilationError::NotACall
        );
    }

    #[test]
    fn test_parquet_unsupported_by_root_only_backend() {
        let query = Expr::call("ResultParquet", vec![events(), Expr::List(vec![])]);
        assert!(matches!(
            QueryCompiler::for_codegen("atlasr21").compile(&query),
            Err(CompilationError::NoSupportedFormat { .. })
        ));
    }

    #[test]
    fn test_ttree_requires_columns() {
        let query = Expr::call("ResultTTree", vec![events()]);
        assert_eq!(
            uproot().compile(&query).unwrap_err(),
            CompilationError::MissingArgument {
                terminal: "ResultTTree".to_string(),
                expected: 2,
                found: 1,
            }
        );
    }
}
