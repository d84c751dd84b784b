pub mod angles;
pub mod houses;
pub mod line;
pub mod snapshot;

pub use angles::Angles;
pub use houses::{
    resolve_house_with_cusps, resolve_placement, resolve_sign, resolve_sign_house, HouseSystem,
    Sign, SignPlacement,
};
pub use line::{format_chart_line, ChartLine, ChartLineEntry};
pub use snapshot::{ChartSnapshot, SourceTag};
