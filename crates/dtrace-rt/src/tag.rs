//! Type tags understood by the runtime, as passed by instrumented code.

pub const INT: &str = "int";
pub const CHAR: &str = "char";
pub const FLOAT: &str = "float";
pub const DOUBLE: &str = "double";
pub const INT_ARRAY: &str = "int[]";
pub const DOUBLE_ARRAY: &str = "double[]";
pub const C_STR: &str = "char*";
