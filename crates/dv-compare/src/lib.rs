pub mod aggregate;
pub mod comparator;
pub mod diff;
pub mod render;
pub mod result;
pub mod tokenize;

pub use aggregate::{
    aggregate, preview, ChangeMagnitude, ComparisonStats, DeltaStats, PreviewEntry, VersionDelta,
};
pub use comparator::{CompareConfig, VersionComparator};
pub use diff::{diff, ChangeKind, ChangeRun, RunText};
pub use render::{project, LineRow, Projection, WordSpan};
pub use result::ComparisonReport;
pub use tokenize::{segment, tokenize, Granularity, Segment, SegmentKind};
