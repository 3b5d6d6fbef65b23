pub mod con;
pub mod geometry;
pub mod outputs;
pub mod scratchpad;
pub mod tree;
pub mod workspaces;

pub use con::{BorderStyle, Con, ConId, ConKind, Direction, FullscreenMode, Layout, Orientation};
pub use geometry::{Point, Rect};
pub use outputs::{Output, OutputId};
pub use tree::Tree;
