//! Saturating notify-until-covered dispatch policy.
//!
//! Walks a ranked donor list, paging each donor not already marked for the
//! request, and stops once the notified count reaches `units_needed` or the
//! list runs out. When coverage is reached the request is marked fulfilled.
//!
//! `units_needed` doubles as the number of donors to page. That conflation
//! is carried over from the behavior this engine replaces and is preserved
//! deliberately; see DESIGN.md.

use crate::domain::{Hospital, SupplyRequest};
use crate::error::Result;
use crate::notify::{format_emergency_message, Notifier};
use crate::ranker::RankedDonor;
use crate::storage::Storage;

/// Page donors for `request` until demand is covered or donors run out.
///
/// Returns the number of donors notified in this pass. Dispatching an
/// already-fulfilled request is a no-op. A donor whose send fails is
/// neither counted nor marked, so the next sweep retries them.
#[tracing::instrument(skip_all, fields(request_id = %request.id, hospital_id = %request.hospital_id))]
pub async fn dispatch<S, N>(
    storage: &S,
    notifier: &N,
    hospital: &Hospital,
    request: &SupplyRequest,
    ranked: &[RankedDonor],
    notify_timeout_ms: u64,
) -> Result<usize>
where
    S: Storage + ?Sized,
    N: Notifier + ?Sized,
{
    if request.fulfilled {
        tracing::debug!("Request already fulfilled, nothing to dispatch");
        return Ok(0);
    }

    let mut notified = 0usize;

    for candidate in ranked {
        if notified as u32 >= request.units_needed {
            break;
        }

        let donor = &candidate.donor;
        if storage.has_notification(donor.id, request.id).await? {
            tracing::debug!(donor_id = %donor.id, "Donor already paged for this request");
            continue;
        }

        let body = format_emergency_message(
            &hospital.name,
            &request.resource_type,
            request.units_needed,
            candidate.route.as_ref(),
        );

        match notifier.send(&donor.contact, &body, notify_timeout_ms).await {
            Ok(true) => {
                storage.record_notification(donor.id, request.id).await?;
                notified += 1;
                tracing::info!(
                    donor_id = %donor.id,
                    distance_km = candidate.distance_km,
                    notified,
                    "Donor paged"
                );
            }
            Ok(false) => {
                tracing::warn!(donor_id = %donor.id, "Notification not delivered, skipping donor");
            }
            Err(e) => {
                tracing::warn!(donor_id = %donor.id, error = %e, "Notification send failed");
            }
        }
    }

    if notified as u32 >= request.units_needed {
        storage.mark_fulfilled(request.id).await?;
        tracing::info!(notified, "Request covered and marked fulfilled");
    } else {
        tracing::info!(
            notified,
            units_needed = request.units_needed,
            "Donors exhausted before coverage, request stays open"
        );
    }

    Ok(notified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewRequest, ResourceType, Urgency};
    use crate::geo::Coordinates;
    use crate::notify::MockNotifier;
    use crate::storage::MemoryStorage;

    struct Fixture {
        storage: MemoryStorage,
        notifier: MockNotifier,
        hospital: Hospital,
    }

    async fn fixture() -> Fixture {
        let storage = MemoryStorage::new();
        let hospital_id = storage.add_hospital("City General", Some(Coordinates::new(28.61, 77.21)));
        let hospital = storage.get_hospital(hospital_id).await.unwrap().unwrap();
        Fixture {
            storage,
            notifier: MockNotifier::new(),
            hospital,
        }
    }

    async fn ranked_donors(fixture: &Fixture, count: usize) -> Vec<RankedDonor> {
        let o_pos = ResourceType::from("O+");
        let mut ranked = Vec::new();
        for i in 0..count {
            let id = fixture.storage.add_donor(
                &format!("donor-{i}"),
                &format!("+1555010{i}"),
                o_pos.clone(),
                Some(Coordinates::new(28.62, 77.22)),
                true,
                true,
            );
            ranked.push(RankedDonor {
                donor: fixture.storage.donor(id).unwrap(),
                distance_km: 1.0 + i as f64,
                route: None,
            });
        }
        ranked
    }

    async fn request(fixture: &Fixture, units_needed: u32) -> SupplyRequest {
        fixture
            .storage
            .create_request(NewRequest {
                hospital_id: fixture.hospital.id,
                resource_type: ResourceType::from("O+"),
                units_needed,
                urgency: Urgency::High,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_saturating_dispatch_stops_at_coverage() {
        let f = fixture().await;
        let ranked = ranked_donors(&f, 5).await;
        let req = request(&f, 3).await;

        let notified = dispatch(&f.storage, &f.notifier, &f.hospital, &req, &ranked, 100)
            .await
            .unwrap();

        assert_eq!(notified, 3);
        assert_eq!(f.notifier.send_count(), 3);
        assert!(f.storage.get_request(req.id).await.unwrap().fulfilled);
    }

    #[tokio::test]
    async fn test_dispatch_exhausts_donors_and_stays_open() {
        let f = fixture().await;
        let ranked = ranked_donors(&f, 2).await;
        let req = request(&f, 3).await;

        let notified = dispatch(&f.storage, &f.notifier, &f.hospital, &req, &ranked, 100)
            .await
            .unwrap();

        assert_eq!(notified, 2);
        assert_eq!(f.notifier.send_count(), 2);
        assert!(!f.storage.get_request(req.id).await.unwrap().fulfilled);
    }

    #[tokio::test]
    async fn test_dispatch_on_fulfilled_request_is_noop() {
        let f = fixture().await;
        let ranked = ranked_donors(&f, 3).await;
        let req = request(&f, 2).await;

        dispatch(&f.storage, &f.notifier, &f.hospital, &req, &ranked, 100)
            .await
            .unwrap();
        let fulfilled = f.storage.get_request(req.id).await.unwrap();
        let stamp = fulfilled.fulfilled_at;
        let sends_before = f.notifier.send_count();

        let notified = dispatch(&f.storage, &f.notifier, &f.hospital, &fulfilled, &ranked, 100)
            .await
            .unwrap();

        assert_eq!(notified, 0);
        assert_eq!(f.notifier.send_count(), sends_before);
        assert_eq!(f.storage.get_request(req.id).await.unwrap().fulfilled_at, stamp);
    }

    #[tokio::test]
    async fn test_marked_donor_is_not_paged_again() {
        let f = fixture().await;
        let ranked = ranked_donors(&f, 2).await;
        let req = request(&f, 2).await;

        // First donor already paged for this request in an earlier pass
        f.storage
            .record_notification(ranked[0].donor.id, req.id)
            .await
            .unwrap();

        let notified = dispatch(&f.storage, &f.notifier, &f.hospital, &req, &ranked, 100)
            .await
            .unwrap();

        // Only the second donor is paged; count restarts per pass
        assert_eq!(notified, 1);
        assert_eq!(f.notifier.contacts(), vec![ranked[1].donor.contact.clone()]);
    }

    #[tokio::test]
    async fn test_failed_send_is_not_counted_or_marked() {
        let f = fixture().await;
        let ranked = ranked_donors(&f, 3).await;
        let req = request(&f, 2).await;

        f.notifier.fail_contact(&ranked[0].donor.contact);

        let notified = dispatch(&f.storage, &f.notifier, &f.hospital, &req, &ranked, 100)
            .await
            .unwrap();

        assert_eq!(notified, 2);
        // Attempted all three: first failed, next two delivered
        assert_eq!(f.notifier.send_count(), 3);
        assert!(!f
            .storage
            .has_notification(ranked[0].donor.id, req.id)
            .await
            .unwrap());
        assert!(f.storage.get_request(req.id).await.unwrap().fulfilled);
    }

    #[tokio::test]
    async fn test_message_includes_route_when_ranked_with_one() {
        let f = fixture().await;
        let mut ranked = ranked_donors(&f, 1).await;
        ranked[0].route = Some(crate::routing::RouteInfo {
            distance_km: 14.0,
            eta_minutes: 20.0,
            maps_link: "http://map.example/r".to_string(),
        });
        let req = request(&f, 1).await;

        dispatch(&f.storage, &f.notifier, &f.hospital, &req, &ranked, 100)
            .await
            .unwrap();

        let sends = f.notifier.sends();
        assert!(sends[0].body.contains("http://map.example/r"));
        assert!(sends[0].body.contains("City General"));
    }
}
