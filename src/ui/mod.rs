/// UI building blocks for the slice grid
///
/// - `grid.rs` - right-to-left cell placement and scroll region extents
/// - `scroll.rs` - wheel input to viewport movement

pub mod grid;
pub mod scroll;
