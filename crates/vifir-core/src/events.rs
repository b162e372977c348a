// Audit/event history collection.
//
// Fans one paginated collector per target entity out onto the runtime,
// fans the pages back in through one bounded channel, and lets a single
// consumer normalize and accumulate. Ordering of the final report never
// depends on arrival order: everything is sorted by event id after
// accumulation, and the report is written in one pass at the end.

use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use vifir_api::{ApiClient, EntityRef, EventFilter, RawEvent};

use crate::error::CoreError;
use crate::session::Session;

/// Maximum events pulled per cursor page.
pub const EVENT_PAGE_SIZE: usize = 500;

/// Bound on in-flight pages between the entity collectors and the
/// consumer. Keeps a fast producer from ballooning memory while the
/// consumer is busy normalizing.
const PAGE_CHANNEL_CAPACITY: usize = 8;

/// Event-type identifiers collected in light mode: security- and
/// audit-relevant types only. Opaque, versioned configuration data --
/// membership is maintained as a flat list, not derived.
pub const LIGHT_EVENT_TYPE_IDS: &[&str] = &[
    "ad.event.JoinDomainEvent",
    "VmFailedToSuspendEvent",
    "VmSuspendedEvent",
    "VmSuspendingEvent",
    "VmDasUpdateOkEvent",
    "VmReconfiguredEvent",
    "UserUnassignedFromGroup",
    "UserAssignedToGroup",
    "UserPasswordChanged",
    "AccountCreatedEvent",
    "AccountRemovedEvent",
    "AccountUpdatedEvent",
    "UserLoginSessionEvent",
    "RoleAddedEvent",
    "RoleRemovedEvent",
    "RoleUpdatedEvent",
    "TemplateUpgradeEvent",
    "TemplateUpgradedEvent",
    "PermissionAddedEvent",
    "PermissionUpdatedEvent",
    "PermissionRemovedEvent",
    "LocalTSMEnabledEvent",
    "DatastoreFileDownloadEvent",
    "DatastoreFileUploadEvent",
    "DatastoreFileDeletedEvent",
    "VmAcquiredMksTicketEvent",
    "com.vmware.vc.guestOperations.GuestOperationAuthFailure",
    "com.vmware.vc.guestOperations.GuestOperation",
    "esx.audit.ssh.enabled",
    "esx.audit.ssh.session.failed",
    "esx.audit.ssh.session.closed",
    "esx.audit.ssh.session.opened",
    "esx.audit.account.locked",
    "esx.audit.account.loginfailures",
    "esx.audit.dcui.login.passwd.changed",
    "esx.audit.dcui.enabled",
    "esx.audit.dcui.disabled",
    "esx.audit.lockdownmode.exceptions.changed",
    "esx.audit.shell.disabled",
    "esx.audit.shell.enabled",
    "esx.audit.lockdownmode.disabled",
    "esx.audit.lockdownmode.enabled",
    "com.vmware.sso.LoginSuccess",
    "com.vmware.sso.LoginFailure",
    "com.vmware.sso.Logout",
    "com.vmware.sso.PrincipalManagement",
    "com.vmware.sso.RoleManagement",
    "com.vmware.sso.IdentitySourceManagement",
    "com.vmware.sso.DomainManagement",
    "com.vmware.sso.ConfigurationManagement",
    "com.vmware.sso.CertificateManager",
    "com.vmware.trustmanagement.VcTrusts",
    "com.vmware.trustmanagement.VcIdentityProviders",
    "com.vmware.cis.CreateGlobalPermission",
    "com.vmware.cis.CreatePermission",
    "com.vmware.cis.RemoveGlobalPermission",
    "com.vmware.cis.RemovePermission",
    "com.vmware.vc.host.Crypto.Enabled",
    "com.vmware.vc.host.Crypto.HostCryptoDisabled",
    "ProfileCreatedEvent",
    "ProfileChangedEvent",
    "ProfileRemovedEvent",
    "ProfileAssociatedEvent",
    "esx.audit.esximage.vib.install.successful",
    "esx.audit.esximage.hostacceptance.changed",
    "esx.audit.esximage.vib.remove.successful",
];

/// One normalized audit/event record, ready for the report.
#[derive(Debug, Clone)]
pub struct EventRecord {
    /// String form of the entity the event was recorded against.
    pub source: String,
    pub created: DateTime<Utc>,
    /// Resolved category/severity label.
    pub category: String,
    pub message: String,
    /// Server-assigned, monotonically increasing; the canonical sort
    /// key for the report.
    pub id: i64,
    pub event_type: String,
}

/// A page of raw events tagged with the entity whose collector
/// produced it.
struct PageBatch {
    source: EntityRef,
    events: Vec<RawEvent>,
}

/// Collect the complete event history for `targets` and write the CSV
/// report into `output_dir`, returning the report path.
///
/// An empty `targets` runs exactly once against the inventory root.
/// With several targets, a failing entity is logged and skipped while
/// the rest run to completion; whatever was collected still gets
/// written. A failure of the *only* target -- or of the retention-age
/// query -- aborts with no file produced.
pub async fn retrieve_events(
    session: &Session,
    light_mode: bool,
    targets: &[EntityRef],
    output_dir: &Path,
) -> Result<PathBuf, CoreError> {
    let client = session.client()?.clone();

    // The time-window filter cannot be built safely without knowing
    // how far back the server retains events.
    let retention_days = resolve_retention_age(&client).await?;
    info!(retention_days, "resolved server event retention age");

    let now = Utc::now();
    let window_start = now - Duration::days(retention_days);

    // Multiple event streams only exist below the root, so an empty
    // selection collapses to a single root-scoped collector rather
    // than running once-per-nothing.
    let effective: Vec<EntityRef> = if targets.is_empty() {
        vec![EntityRef::root()]
    } else {
        targets.to_vec()
    };
    let single_target = effective.len() == 1;

    let (page_tx, page_rx) = mpsc::channel::<PageBatch>(PAGE_CHANNEL_CAPACITY);

    let mut collectors = JoinSet::new();
    for entity in effective {
        let filter = EventFilter {
            entity: entity.clone(),
            recursive: true,
            created_after: window_start,
            created_before: now,
            type_ids: light_mode.then(|| {
                LIGHT_EVENT_TYPE_IDS.iter().map(|s| (*s).to_owned()).collect()
            }),
        };
        let client = client.clone();
        let page_tx = page_tx.clone();
        collectors.spawn(async move {
            let result = collect_entity(&client, &filter, page_tx).await;
            (entity, result)
        });
    }
    // The collectors hold the only remaining senders; once they all
    // finish, the channel closes and the consumer drains what is left.
    drop(page_tx);

    let consumer = tokio::spawn(drain_pages(page_rx));

    let mut first_failure: Option<CoreError> = None;
    let mut succeeded = 0_usize;
    while let Some(joined) = collectors.join_next().await {
        match joined {
            Ok((_, Ok(()))) => succeeded += 1,
            Ok((entity, Err(e))) => {
                if single_target {
                    first_failure.get_or_insert(CoreError::Api(e));
                } else if e.is_not_found() {
                    warn!(entity = %entity, "entity vanished since discovery; skipping");
                    first_failure.get_or_insert(CoreError::Api(e));
                } else {
                    warn!(entity = %entity, error = %e, "event collection failed for entity; skipping");
                    first_failure.get_or_insert(CoreError::Api(e));
                }
            }
            Err(join_err) => {
                warn!(error = %join_err, "event collector task aborted");
            }
        }
    }

    // All producers are done and the channel is closed; wait for the
    // consumer to finish draining. This, not the producer join, is the
    // completion signal -- the consumer may still be working through
    // buffered pages.
    let mut records = consumer
        .await
        .map_err(|e| CoreError::Io(std::io::Error::other(e)))?;

    if single_target {
        if let Some(failure) = first_failure {
            return Err(failure);
        }
    } else if succeeded == 0 {
        if let Some(failure) = first_failure {
            return Err(failure);
        }
    }
    debug!(total = records.len(), "event accumulation finished; post-processing");

    // Ids are globally unique and monotonic, so id order is also
    // chronological order with better granularity than timestamps.
    records.sort_by_key(|r| r.id);

    let report_path = output_dir.join(format!("audit-events-{}.csv", Utc::now().timestamp()));
    write_report(&report_path, &records)?;
    info!(path = %report_path.display(), rows = records.len(), "event report written");
    Ok(report_path)
}

/// Resolve the server-configured maximum event retention age in days.
async fn resolve_retention_age(client: &ApiClient) -> Result<i64, CoreError> {
    let setting = client.setting("event.maxAge").await.map_err(|e| {
        CoreError::RetentionAgeUnknown {
            reason: e.to_string(),
        }
    })?;
    setting
        .as_i64()
        .filter(|days| *days > 0)
        .ok_or_else(|| CoreError::RetentionAgeUnknown {
            reason: format!("setting '{}' holds no usable value", setting.key),
        })
}

/// Drive one entity's cursor to exhaustion, pushing every non-empty
/// page onto the shared channel. The cursor is released on every path,
/// error included.
async fn collect_entity(
    client: &ApiClient,
    filter: &EventFilter,
    page_tx: mpsc::Sender<PageBatch>,
) -> Result<(), vifir_api::Error> {
    let mut cursor = client.create_event_cursor(filter, EVENT_PAGE_SIZE).await?;
    debug!(entity = %filter.entity, cursor = cursor.id(), "event cursor opened");

    let mut result = Ok(());
    loop {
        match cursor.next_page().await {
            Ok(page) if page.is_empty() => break,
            Ok(page) => {
                let batch = PageBatch {
                    source: filter.entity.clone(),
                    events: page,
                };
                if page_tx.send(batch).await.is_err() {
                    // Consumer is gone; nothing left to deliver to.
                    break;
                }
            }
            Err(e) => {
                result = Err(e);
                break;
            }
        }
    }

    if let Err(e) = cursor.release().await {
        warn!(entity = %filter.entity, error = %e, "event cursor release failed");
    }
    result
}

/// The single consumer: normalizes every page into `EventRecord`s.
/// Being the only writer to the accumulator keeps the hot path free of
/// locks.
async fn drain_pages(mut page_rx: mpsc::Receiver<PageBatch>) -> Vec<EventRecord> {
    let mut records = Vec::new();
    while let Some(batch) = page_rx.recv().await {
        for event in batch.events {
            if let Some(record) = normalize(&batch.source, event) {
                records.push(record);
            }
        }
    }
    records
}

/// Normalize one raw event. A record whose category cannot be resolved
/// is dropped on its own -- one bad event never discards the page.
fn normalize(source: &EntityRef, event: RawEvent) -> Option<EventRecord> {
    let category = match event.category.as_deref().map(str::trim) {
        Some(c) if !c.is_empty() => c.to_owned(),
        _ => {
            warn!(
                id = event.id,
                event_type = %event.event_type,
                "could not resolve event category; record skipped"
            );
            return None;
        }
    };
    Some(EventRecord {
        source: if event.entity.is_empty() {
            source.to_string()
        } else {
            event.entity
        },
        created: event.created,
        category,
        message: event.message.trim().to_owned(),
        id: event.id,
        event_type: event.event_type,
    })
}

/// Write the CSV report: header, one row per record in the order
/// given, then flush and sync before the handle closes. The artifact
/// is never observable in a half-written state.
fn write_report(path: &Path, records: &[EventRecord]) -> Result<(), CoreError> {
    let file = File::create(path)?;
    {
        let mut writer = csv::Writer::from_writer(&file);
        writer.write_record(["Timestamp", "ID", "Level", "Event Type", "Message"])?;
        for record in records {
            writer.write_record([
                record.created.timestamp().to_string(),
                record.id.to_string(),
                record.category.clone(),
                record.event_type.clone(),
                record.message.clone(),
            ])?;
        }
        writer.flush().map_err(CoreError::Io)?;
    }
    file.sync_all()?;
    Ok(())
}
