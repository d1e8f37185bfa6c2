//! Data-source providers (C3, spec §4.3).
//!
//! A typed capability interface with two concrete variants, per Design
//! Notes' "dynamic duck-typed provider objects -> typed capability
//! interface" re-architecture. `available()` and `load()` are async because
//! they are the system's only I/O suspension points for data loading
//! (spec §5).

pub mod fallback;
pub mod primary;

use crate::error::FetchError;
use crate::model::{Dataset, Stop};
use crate::recovery::city;
use async_trait::async_trait;

#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn available(&self) -> bool;
    async fn load(&self) -> Result<Dataset, FetchError>;
}

pub use fallback::FallbackProvider;
pub use primary::PrimaryProvider;

/// Fills in `isAirport`/`isRailway`/ferry-terminal on stops whose source
/// data didn't already tag them, inferring from the stop name (spec §4.6
/// step 4's facility-differentiation test relies on these being set before
/// the graph builder runs). A stop with any flag already set is trusted
/// as-is; inference only fills an entirely untagged stop.
pub(crate) fn tag_facility_types(stops: &mut [Stop]) {
    for stop in stops.iter_mut() {
        if stop.is_airport || stop.is_railway || stop.is_ferry_terminal {
            continue;
        }
        let (is_airport, is_railway, is_ferry_terminal) = city::infer_facility(&stop.name);
        stop.is_airport = is_airport;
        stop.is_railway = is_railway;
        stop.is_ferry_terminal = is_ferry_terminal;
    }
}
