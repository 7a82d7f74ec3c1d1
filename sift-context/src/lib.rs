pub mod text;

// Re-export the main splitting API for external use
pub use text::{
    SplitError, TextSpan, TextSplitter, get_delimiters_for_path, split,
};
