//! Template - message に対する JSONPath テンプレート解決
//!
//! - `{{path}}`: 最初にマッチした値（型はそのまま）
//! - `{[path]}`: マッチした全ての値の配列
//! - `{path}`: 文字列中への埋め込み（複数可）

pub mod jsonpath;
pub mod resolver;

pub use self::jsonpath::JsonPath;
pub use self::resolver::{resolve_object, resolve_path_str};
