pub mod value;
pub mod path;
pub mod printer;
pub mod text_diff;
pub mod differ;
pub mod render;
pub mod evaluator;

pub use value::{AtomicPredicate, AttrMarker, Node, Scalar, Symbol, ValueId, ValueKind, ValueTree};
pub use path::{is_bare_identifier, quote_string, AttrPath, Segment};
pub use printer::{PrintMode, ValuePrinter};
pub use text_diff::TextDiffer;
pub use differ::{DiffSink, Differencer, DifferOptions};
pub use render::{OutputRenderer, Palette};
pub use evaluator::{DocumentEvaluator, DocumentFormat, Evaluator, Source};
