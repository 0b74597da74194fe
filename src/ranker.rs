//! Nearest-eligible-donor ranking.
//!
//! Pure over the donor snapshot and the route collaborator: no storage
//! writes, no notifications. Both loops and the manual SOS path rank
//! through this one function so notification order is identical everywhere.

use crate::domain::{Donor, ResourceType};
use crate::geo::{self, Coordinates};
use crate::routing::{RouteInfo, RouteLookup};

/// A donor that survived filtering, with the distance that ranked them.
#[derive(Debug, Clone)]
pub struct RankedDonor {
    pub donor: Donor,
    pub distance_km: f64,

    /// Driving route annotation; `None` when the lookup failed or the
    /// routing service had no route. The donor is still ranked by
    /// great-circle distance.
    pub route: Option<RouteInfo>,
}

/// Rank eligible donors by proximity to `origin`.
///
/// Filters to donors that match the resource type, are available, and have
/// given emergency consent, then drops anyone farther than
/// `max_distance_km` or without a usable coordinate. Output is ascending by
/// distance with donor-id tie-breaks, so a fixed snapshot always ranks the
/// same way.
pub async fn rank_donors<R: RouteLookup + ?Sized>(
    donors: Vec<Donor>,
    resource_type: &ResourceType,
    origin: Coordinates,
    max_distance_km: f64,
    routes: &R,
    route_timeout_ms: u64,
) -> Vec<RankedDonor> {
    let mut ranked = Vec::new();

    for donor in donors {
        if !donor.is_eligible(resource_type) {
            continue;
        }

        let distance_km = geo::distance(donor.coordinates, Some(origin));
        // The infinity sentinel for missing coordinates fails this filter too
        if distance_km > max_distance_km {
            continue;
        }

        // A finite distance implies the donor has a coordinate
        let route = if let Some(donor_coords) = donor.coordinates {
            match routes.route_info(donor_coords, origin, route_timeout_ms).await {
                Ok(route) => route,
                Err(e) => {
                    tracing::debug!(
                        donor_id = %donor.id,
                        error = %e,
                        "Route lookup failed, ranking by distance alone"
                    );
                    None
                }
            }
        } else {
            None
        };

        ranked.push(RankedDonor {
            donor,
            distance_km,
            route,
        });
    }

    ranked.sort_by(|a, b| {
        a.distance_km
            .total_cmp(&b.distance_km)
            .then_with(|| a.donor.id.cmp(&b.donor.id))
    });

    ranked
}
