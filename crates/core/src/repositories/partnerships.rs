//! Partnership Registry.
//!
//! A partnership is standing trust between one fleet and one hospital. It is derived from the
//! collaboration-request workflow but stored separately: accepting a request calls
//! [`PartnershipRegistry::ensure_active`], which is idempotent so that retried acceptances and
//! reconciliation sweeps never mint duplicate trust grants.

use crate::constants::audit_actions;
use crate::error::{CoreError, CoreResult};
use crate::events::DomainEvent;
use crate::principal::Principal;
use crate::repositories::organizations::OrganizationDirectory;
use crate::store::{Tables, Transaction};
use chrono::{DateTime, Utc};
use medtrip_ids::{CollaborationRequestId, OrganizationId, PartnershipId, UserId};
use medtrip_types::{NonEmptyText, OrganizationType};
use serde::{Deserialize, Serialize};

// ============================================================================
// DATA STRUCTURES
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartnershipStatus {
    Active,
    Inactive,
}

/// Unique per (fleet, hospital) pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partnership {
    pub id: PartnershipId,
    pub fleet_id: OrganizationId,
    pub hospital_id: OrganizationId,
    pub status: PartnershipStatus,
    pub created_at: DateTime<Utc>,
    pub activated_at: DateTime<Utc>,
    pub deactivated_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    #[serde(alias = "approved")]
    Accepted,
    Rejected,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaborationRequest {
    pub id: CollaborationRequestId,
    pub hospital_id: OrganizationId,
    pub fleet_id: OrganizationId,
    pub requested_by_organization_id: OrganizationId,
    pub requested_by: UserId,
    pub message: Option<NonEmptyText>,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub responded_by: Option<UserId>,
}

impl CollaborationRequest {
    /// The side of the pair that did not send the request.
    pub fn counterparty(&self) -> OrganizationId {
        if self.requested_by_organization_id == self.hospital_id {
            self.fleet_id
        } else {
            self.hospital_id
        }
    }
}

/// What [`PartnershipRegistry::ensure_active`] had to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnsureOutcome {
    Created,
    Reactivated,
    AlreadyActive,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Acceptance {
    pub request: CollaborationRequest,
    pub partnership: Partnership,
    pub outcome: EnsureOutcome,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub created: usize,
    pub reactivated: usize,
    pub already_active: usize,
    /// Accepted requests whose partnership was deliberately ended afterwards.
    pub skipped: usize,
}

// ============================================================================
// REGISTRY
// ============================================================================

pub struct PartnershipRegistry;

impl PartnershipRegistry {
    pub fn find(
        tables: &Tables,
        fleet_id: OrganizationId,
        hospital_id: OrganizationId,
    ) -> Option<&Partnership> {
        tables
            .partnerships
            .values()
            .find(|p| p.fleet_id == fleet_id && p.hospital_id == hospital_id)
    }

    /// True if an active partnership joins the two organizations, in either argument order.
    pub fn is_active_between(tables: &Tables, a: OrganizationId, b: OrganizationId) -> bool {
        tables.partnerships.values().any(|p| {
            p.status == PartnershipStatus::Active
                && ((p.fleet_id == a && p.hospital_id == b)
                    || (p.fleet_id == b && p.hospital_id == a))
        })
    }

    /// Organizations holding an active partnership with `org`.
    pub fn active_partners_of(tables: &Tables, org: OrganizationId) -> Vec<OrganizationId> {
        tables
            .partnerships
            .values()
            .filter(|p| p.status == PartnershipStatus::Active)
            .filter_map(|p| {
                if p.fleet_id == org {
                    Some(p.hospital_id)
                } else if p.hospital_id == org {
                    Some(p.fleet_id)
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn get_request(
        tables: &Tables,
        id: CollaborationRequestId,
    ) -> CoreResult<&CollaborationRequest> {
        tables
            .collaboration_requests
            .get(&id)
            .ok_or_else(|| CoreError::not_found("collaboration request", id))
    }

    /// Requests involving `org` (all of them for a superadmin).
    pub fn list_requests(tables: &Tables, principal: &Principal) -> Vec<CollaborationRequest> {
        tables
            .collaboration_requests
            .values()
            .filter(|r| {
                principal.is_superadmin()
                    || principal.belongs_to(r.hospital_id)
                    || principal.belongs_to(r.fleet_id)
            })
            .cloned()
            .collect()
    }

    /// Create, reactivate or leave alone the partnership for `(fleet_id, hospital_id)`.
    pub(crate) fn ensure_active(
        tx: &mut Transaction<'_>,
        fleet_id: OrganizationId,
        hospital_id: OrganizationId,
    ) -> CoreResult<(Partnership, EnsureOutcome)> {
        OrganizationDirectory::require_active_of_type(tx.tables(), fleet_id, OrganizationType::Fleet)?;
        OrganizationDirectory::require_active_of_type(
            tx.tables(),
            hospital_id,
            OrganizationType::Hospital,
        )?;

        let now = tx.now();
        let existing = Self::find(tx.tables(), fleet_id, hospital_id).map(|p| (p.id, p.status));

        let (partnership, outcome) = match existing {
            Some((id, PartnershipStatus::Active)) => {
                let p = tx.tables().partnerships[&id].clone();
                (p, EnsureOutcome::AlreadyActive)
            }
            Some((id, PartnershipStatus::Inactive)) => {
                let p = tx
                    .tables_mut()
                    .partnerships
                    .get_mut(&id)
                    .ok_or_else(|| CoreError::not_found("partnership", id))?;
                p.status = PartnershipStatus::Active;
                p.activated_at = now;
                p.deactivated_at = None;
                (p.clone(), EnsureOutcome::Reactivated)
            }
            None => {
                let p = Partnership {
                    id: PartnershipId::new(),
                    fleet_id,
                    hospital_id,
                    status: PartnershipStatus::Active,
                    created_at: now,
                    activated_at: now,
                    deactivated_at: None,
                };
                tx.tables_mut().partnerships.insert(p.id, p.clone());
                (p, EnsureOutcome::Created)
            }
        };

        if outcome != EnsureOutcome::AlreadyActive {
            tx.emit(DomainEvent::PartnershipActivated {
                partnership_id: partnership.id,
                fleet_id,
                hospital_id,
            });
            tracing::info!(
                partnership = %partnership.id,
                fleet = %fleet_id,
                hospital = %hospital_id,
                ?outcome,
                "partnership activated"
            );
        }

        Ok((partnership, outcome))
    }

    pub(crate) fn request_collaboration(
        tx: &mut Transaction<'_>,
        principal: &Principal,
        hospital_id: OrganizationId,
        fleet_id: OrganizationId,
        message: Option<NonEmptyText>,
    ) -> CoreResult<CollaborationRequest> {
        let requesting_org = match principal.organization_id {
            Some(org) if org == hospital_id || org == fleet_id => org,
            _ => {
                return Err(CoreError::Forbidden(
                    "collaboration requests must come from one of the two organizations".into(),
                ))
            }
        };
        if !principal.administers(requesting_org) {
            return Err(CoreError::Forbidden(
                "only an organization admin may request a collaboration".into(),
            ));
        }

        OrganizationDirectory::require_active_of_type(
            tx.tables(),
            hospital_id,
            OrganizationType::Hospital,
        )?;
        OrganizationDirectory::require_active_of_type(tx.tables(), fleet_id, OrganizationType::Fleet)?;

        let pending = tx.tables().collaboration_requests.values().any(|r| {
            r.hospital_id == hospital_id
                && r.fleet_id == fleet_id
                && r.status == RequestStatus::Pending
        });
        if pending {
            return Err(CoreError::Conflict(
                "a collaboration request between these organizations is already pending".into(),
            ));
        }
        if Self::find(tx.tables(), fleet_id, hospital_id)
            .is_some_and(|p| p.status == PartnershipStatus::Active)
        {
            return Err(CoreError::Conflict(
                "these organizations already have an active partnership".into(),
            ));
        }

        let request = CollaborationRequest {
            id: CollaborationRequestId::new(),
            hospital_id,
            fleet_id,
            requested_by_organization_id: requesting_org,
            requested_by: principal.user_id,
            message,
            status: RequestStatus::Pending,
            created_at: tx.now(),
            responded_at: None,
            responded_by: None,
        };
        tx.tables_mut()
            .collaboration_requests
            .insert(request.id, request.clone());

        tx.emit(DomainEvent::CollaborationRequested {
            request_id: request.id,
            hospital_id,
            fleet_id,
        });
        tx.audit(principal, audit_actions::COLLABORATION_REQUEST, request.id);
        Ok(request)
    }

    pub(crate) fn accept(
        tx: &mut Transaction<'_>,
        principal: &Principal,
        request_id: CollaborationRequestId,
    ) -> CoreResult<Acceptance> {
        let request = Self::pending_request(tx.tables(), request_id)?;
        if !principal.administers(request.counterparty()) {
            return Err(CoreError::Forbidden(
                "only the receiving organization may accept a collaboration request".into(),
            ));
        }

        let request = Self::resolve(tx, principal, request_id, RequestStatus::Accepted)?;
        let (partnership, outcome) = Self::ensure_active(tx, request.fleet_id, request.hospital_id)?;
        tx.audit(principal, audit_actions::COLLABORATION_ACCEPT, request_id);

        Ok(Acceptance {
            request,
            partnership,
            outcome,
        })
    }

    pub(crate) fn reject(
        tx: &mut Transaction<'_>,
        principal: &Principal,
        request_id: CollaborationRequestId,
    ) -> CoreResult<CollaborationRequest> {
        let request = Self::pending_request(tx.tables(), request_id)?;
        if !principal.administers(request.counterparty()) {
            return Err(CoreError::Forbidden(
                "only the receiving organization may reject a collaboration request".into(),
            ));
        }

        let request = Self::resolve(tx, principal, request_id, RequestStatus::Rejected)?;
        tx.audit(principal, audit_actions::COLLABORATION_REJECT, request_id);
        Ok(request)
    }

    pub(crate) fn cancel(
        tx: &mut Transaction<'_>,
        principal: &Principal,
        request_id: CollaborationRequestId,
    ) -> CoreResult<CollaborationRequest> {
        let request = Self::pending_request(tx.tables(), request_id)?;
        if !principal.administers(request.requested_by_organization_id) {
            return Err(CoreError::Forbidden(
                "only the requesting organization may cancel a collaboration request".into(),
            ));
        }

        let request = Self::resolve(tx, principal, request_id, RequestStatus::Cancelled)?;
        tx.audit(principal, audit_actions::COLLABORATION_CANCEL, request_id);
        Ok(request)
    }

    pub(crate) fn deactivate(
        tx: &mut Transaction<'_>,
        principal: &Principal,
        fleet_id: OrganizationId,
        hospital_id: OrganizationId,
    ) -> CoreResult<Partnership> {
        if !(principal.administers(fleet_id) || principal.administers(hospital_id)) {
            return Err(CoreError::Forbidden(
                "only a party to the partnership may end it".into(),
            ));
        }

        let id = match Self::find(tx.tables(), fleet_id, hospital_id) {
            Some(p) if p.status == PartnershipStatus::Active => p.id,
            Some(_) => {
                return Err(CoreError::Conflict("partnership is already inactive".into()))
            }
            None => {
                return Err(CoreError::not_found(
                    "partnership",
                    format!("{fleet_id}/{hospital_id}"),
                ))
            }
        };

        let now = tx.now();
        let p = tx
            .tables_mut()
            .partnerships
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found("partnership", id))?;
        p.status = PartnershipStatus::Inactive;
        p.deactivated_at = Some(now);
        let partnership = p.clone();

        tx.emit(DomainEvent::PartnershipDeactivated {
            partnership_id: id,
            fleet_id,
            hospital_id,
        });
        tx.audit(principal, audit_actions::PARTNERSHIP_DEACTIVATE, id);
        tracing::info!(partnership = %id, "partnership deactivated");
        Ok(partnership)
    }

    /// Re-derive partnerships from every accepted request.
    ///
    /// A partnership that was ended after the request was accepted stays ended.
    pub(crate) fn reconcile_accepted_requests(
        tx: &mut Transaction<'_>,
    ) -> CoreResult<ReconcileReport> {
        let accepted: Vec<(OrganizationId, OrganizationId, Option<DateTime<Utc>>)> = tx
            .tables()
            .collaboration_requests
            .values()
            .filter(|r| r.status == RequestStatus::Accepted)
            .map(|r| (r.fleet_id, r.hospital_id, r.responded_at))
            .collect();

        let mut report = ReconcileReport::default();
        for (fleet_id, hospital_id, accepted_at) in accepted {
            let ended_later = Self::find(tx.tables(), fleet_id, hospital_id)
                .filter(|p| p.status == PartnershipStatus::Inactive)
                .and_then(|p| p.deactivated_at)
                .is_some_and(|ended| accepted_at.map_or(true, |at| ended >= at));
            if ended_later {
                report.skipped += 1;
                continue;
            }

            match Self::ensure_active(tx, fleet_id, hospital_id) {
                Ok((_, EnsureOutcome::Created)) => report.created += 1,
                Ok((_, EnsureOutcome::Reactivated)) => report.reactivated += 1,
                Ok((_, EnsureOutcome::AlreadyActive)) => report.already_active += 1,
                Err(e @ CoreError::Internal(_)) => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        fleet = %fleet_id,
                        hospital = %hospital_id,
                        error = %e,
                        "skipping accepted request during reconciliation"
                    );
                    report.skipped += 1;
                }
            }
        }

        tracing::info!(?report, "partnership reconciliation finished");
        Ok(report)
    }

    fn pending_request(
        tables: &Tables,
        id: CollaborationRequestId,
    ) -> CoreResult<CollaborationRequest> {
        let request = Self::get_request(tables, id)?;
        if request.status != RequestStatus::Pending {
            return Err(CoreError::Conflict(format!(
                "collaboration request {id} is no longer pending"
            )));
        }
        Ok(request.clone())
    }

    fn resolve(
        tx: &mut Transaction<'_>,
        principal: &Principal,
        id: CollaborationRequestId,
        status: RequestStatus,
    ) -> CoreResult<CollaborationRequest> {
        let now = tx.now();
        let request = tx
            .tables_mut()
            .collaboration_requests
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found("collaboration request", id))?;
        request.status = status;
        request.responded_at = Some(now);
        request.responded_by = Some(principal.user_id);
        let request = request.clone();

        tx.emit(DomainEvent::CollaborationResolved {
            request_id: id,
            status,
        });
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use crate::test_support::{text, World};

    fn partnership_rows(world: &World) -> usize {
        world
            .tables(|t| Ok(t.partnerships.len()))
            .expect("read")
    }

    #[test]
    fn ensure_active_is_idempotent() {
        let world = World::new();
        let (first, outcome) = world
            .service
            .ensure_active_partnership(&world.root, world.fleet, world.hospital)
            .expect("first ensure");
        assert_eq!(outcome, EnsureOutcome::Created);

        let (second, outcome) = world
            .service
            .ensure_active_partnership(&world.root, world.fleet, world.hospital)
            .expect("second ensure");
        assert_eq!(outcome, EnsureOutcome::AlreadyActive);
        assert_eq!(first.id, second.id);
        assert_eq!(partnership_rows(&world), 1);

        let activations = world
            .events
            .names()
            .into_iter()
            .filter(|n| *n == "partnership_activated")
            .count();
        assert_eq!(activations, 1);
    }

    #[test]
    fn ensure_active_reactivates_and_checks_types() {
        let world = World::new();
        world.partner(world.fleet, world.hospital);
        let hospital_admin = world.admin(world.hospital);
        let ended = world
            .service
            .deactivate_partnership(&hospital_admin, world.fleet, world.hospital)
            .expect("either party may end it");
        assert_eq!(ended.status, PartnershipStatus::Inactive);
        assert!(!world
            .service
            .is_partnered(world.fleet, world.hospital)
            .expect("read"));

        let (again, outcome) = world
            .service
            .ensure_active_partnership(&world.root, world.fleet, world.hospital)
            .expect("reactivate");
        assert_eq!(outcome, EnsureOutcome::Reactivated);
        assert_eq!(again.id, ended.id);
        assert_eq!(again.deactivated_at, None);
        assert_eq!(partnership_rows(&world), 1);

        let err = world
            .service
            .ensure_active_partnership(&world.root, world.hospital, world.other_hospital)
            .expect_err("two hospitals");
        assert!(matches!(err, CoreError::InvalidInput(_)));

        let err = world
            .service
            .ensure_active_partnership(&hospital_admin, world.fleet, world.hospital)
            .expect_err("direct grants are an operator action");
        assert!(matches!(err, CoreError::Forbidden(_)));
    }

    #[test]
    fn request_accept_workflow() {
        let world = World::new();
        let hospital_admin = world.admin(world.hospital);
        let fleet_admin = world.admin(world.fleet);

        let request = world
            .service
            .request_collaboration(
                &hospital_admin,
                world.hospital,
                world.fleet,
                Some(text("night cover")),
            )
            .expect("request");
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.counterparty(), world.fleet);

        let err = world
            .service
            .request_collaboration(&hospital_admin, world.hospital, world.fleet, None)
            .expect_err("duplicate pending request");
        assert!(matches!(err, CoreError::Conflict(_)));

        let err = world
            .service
            .accept_collaboration(&hospital_admin, request.id)
            .expect_err("requester cannot accept its own request");
        assert!(matches!(err, CoreError::Forbidden(_)));

        let acceptance = world
            .service
            .accept_collaboration(&fleet_admin, request.id)
            .expect("fleet accepts");
        assert_eq!(acceptance.outcome, EnsureOutcome::Created);
        assert_eq!(acceptance.request.status, RequestStatus::Accepted);
        assert_eq!(acceptance.request.responded_by, Some(fleet_admin.user_id));

        let err = world
            .service
            .accept_collaboration(&fleet_admin, request.id)
            .expect_err("no longer pending");
        assert!(matches!(err, CoreError::Conflict(_)));
        assert_eq!(partnership_rows(&world), 1);

        let err = world
            .service
            .request_collaboration(&fleet_admin, world.hospital, world.fleet, None)
            .expect_err("already partnered");
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[test]
    fn cancel_and_reject_belong_to_opposite_sides() {
        let world = World::new();
        let hospital_admin = world.admin(world.hospital);
        let fleet_admin = world.admin(world.fleet);

        let request = world
            .service
            .request_collaboration(&fleet_admin, world.hospital, world.fleet, None)
            .expect("fleet asks");

        let err = world
            .service
            .cancel_collaboration(&hospital_admin, request.id)
            .expect_err("only the requester cancels");
        assert!(matches!(err, CoreError::Forbidden(_)));
        let err = world
            .service
            .reject_collaboration(&fleet_admin, request.id)
            .expect_err("only the receiver rejects");
        assert!(matches!(err, CoreError::Forbidden(_)));

        let cancelled = world
            .service
            .cancel_collaboration(&fleet_admin, request.id)
            .expect("requester cancels");
        assert_eq!(cancelled.status, RequestStatus::Cancelled);

        let err = world
            .service
            .reject_collaboration(&hospital_admin, request.id)
            .expect_err("already cancelled");
        assert!(matches!(err, CoreError::Conflict(_)));
        assert_eq!(partnership_rows(&world), 0);
    }

    #[test]
    fn reconciliation_restores_lost_rows_but_respects_deactivation() {
        let world = World::new();
        let hospital_admin = world.admin(world.hospital);
        let fleet_admin = world.admin(world.fleet);
        let request = world
            .service
            .request_collaboration(&hospital_admin, world.hospital, world.fleet, None)
            .expect("request");
        world
            .service
            .accept_collaboration(&fleet_admin, request.id)
            .expect("accept");

        world
            .service
            .store()
            .write(|tx| {
                tx.tables_mut().partnerships.clear();
                Ok(())
            })
            .expect("drop partnership rows");

        let report = world
            .service
            .reconcile_partnerships(&world.root)
            .expect("reconcile");
        assert_eq!(report.created, 1);
        assert!(world
            .service
            .is_partnered(world.fleet, world.hospital)
            .expect("read"));

        let report = world
            .service
            .reconcile_partnerships(&world.root)
            .expect("reconcile again");
        assert_eq!(report.already_active, 1);
        assert_eq!(report.created, 0);

        world
            .service
            .deactivate_partnership(&fleet_admin, world.fleet, world.hospital)
            .expect("end partnership");
        let report = world
            .service
            .reconcile_partnerships(&world.root)
            .expect("reconcile after end");
        assert_eq!(report.skipped, 1);
        assert!(!world
            .service
            .is_partnered(world.fleet, world.hospital)
            .expect("read"));
    }

    #[test]
    fn reconciliation_counts_a_reactivated_partnership_as_active() {
        let world = World::new();
        let hospital_admin = world.admin(world.hospital);
        let fleet_admin = world.admin(world.fleet);
        let request = world
            .service
            .request_collaboration(&hospital_admin, world.hospital, world.fleet, None)
            .expect("request");
        world
            .service
            .accept_collaboration(&fleet_admin, request.id)
            .expect("accept");
        world
            .service
            .deactivate_partnership(&fleet_admin, world.fleet, world.hospital)
            .expect("end partnership");
        world
            .service
            .ensure_active_partnership(&world.root, world.fleet, world.hospital)
            .expect("operator restores it");

        let report = world
            .service
            .reconcile_partnerships(&world.root)
            .expect("reconcile");
        assert_eq!(report.skipped, 0);
        assert_eq!(report.already_active, 1);
    }
}
