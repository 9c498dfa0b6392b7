use shardgate_types::{Event, TransactionRecord, TxStatus};

const RELAYED_V1_PREFIX: &str = "relayedTx@";
const RELAYED_V2_PREFIX: &str = "relayedTxV2@";
const BUILTIN_INVALID_MARKER: &str = "invalid function";

/// Terminal event identifiers the classifier watches for. These are network
/// configuration, not protocol constants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMarkers {
    pub completed: Vec<String>,
    pub errors: Vec<String>,
}

impl Default for EventMarkers {
    fn default() -> Self {
        Self {
            completed: vec!["completedTxEvent".to_string()],
            errors: vec!["signalError".to_string(), "internalVMErrors".to_string()],
        }
    }
}

impl EventMarkers {
    fn is_completion(&self, event: &Event) -> bool {
        self.completed.iter().any(|id| id == &event.identifier)
    }

    fn is_error(&self, event: &Event) -> bool {
        self.errors.iter().any(|id| id == &event.identifier)
    }
}

/// The coarse transaction kind, derived from the payload and receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    MoveBalance,
    ScCall,
    ScDeploy,
    Relayed,
    BuiltinInvalid,
}

pub fn kind_of(record: &TransactionRecord) -> TransactionKind {
    if record.data.starts_with(RELAYED_V1_PREFIX) || record.data.starts_with(RELAYED_V2_PREFIX) {
        return TransactionKind::Relayed;
    }
    if record
        .own_events()
        .any(|event| event.identifier == BUILTIN_INVALID_MARKER)
    {
        return TransactionKind::BuiltinInvalid;
    }
    if record.data.is_empty() {
        return TransactionKind::MoveBalance;
    }
    if is_deploy_receiver(&record.receiver) {
        return TransactionKind::ScDeploy;
    }
    TransactionKind::ScCall
}

// Contract deployments target the reserved all-zero address.
fn is_deploy_receiver(receiver: &str) -> bool {
    !receiver.is_empty() && receiver.bytes().all(|b| b == b'0')
}

/// Classify the execution outcome of one transaction record.
///
/// Pure and total over any record. `with_results` states whether the record
/// was fetched together with its derived sub-transactions and their logs;
/// without them an empty trace is indistinguishable from a trace that was
/// simply not requested, so the answer degrades to `Unknown` rather than
/// guessing.
pub fn classify(record: &TransactionRecord, with_results: bool, markers: &EventMarkers) -> TxStatus {
    let trace_is_empty =
        record.own_events().next().is_none() && record.smart_contract_results.is_empty();

    // an empty trace that was never asked for its results carries no signal
    if trace_is_empty && !with_results {
        return TxStatus::Unknown;
    }

    // rejection is the one verdict the raw status alone settles
    if record.status == "invalid" {
        return TxStatus::Fail;
    }

    let kind = kind_of(record);
    if kind == TransactionKind::BuiltinInvalid {
        return TxStatus::Fail;
    }

    if has_error_event(record, with_results, markers) {
        return TxStatus::Fail;
    }

    if trace_is_empty {
        // a plain transfer emits no events at all; its raw status is final
        if kind == TransactionKind::MoveBalance {
            return from_raw_status(&record.status);
        }
        return TxStatus::Pending;
    }

    if has_completion_event(record, with_results, markers) {
        return TxStatus::Success;
    }

    // events exist but no terminal marker yet: execution is still unwinding
    TxStatus::Pending
}

fn from_raw_status(raw: &str) -> TxStatus {
    match raw {
        "success" | "executed" => TxStatus::Success,
        "fail" | "failed" => TxStatus::Fail,
        "pending" | "partially-executed" | "received" => TxStatus::Pending,
        _ => TxStatus::Unknown,
    }
}

fn has_error_event(record: &TransactionRecord, with_results: bool, markers: &EventMarkers) -> bool {
    if record.own_events().any(|event| markers.is_error(event)) {
        return true;
    }
    if !with_results {
        return false;
    }
    record.smart_contract_results.iter().any(|scr| {
        scr.logs
            .iter()
            .flat_map(|logs| logs.events.iter())
            .any(|event| markers.is_error(event))
    })
}

fn has_completion_event(
    record: &TransactionRecord,
    with_results: bool,
    markers: &EventMarkers,
) -> bool {
    if record.own_events().any(|event| markers.is_completion(event)) {
        return true;
    }
    if !with_results {
        return false;
    }
    record.smart_contract_results.iter().any(|scr| {
        scr.logs
            .iter()
            .flat_map(|logs| logs.events.iter())
            .any(|event| markers.is_completion(event))
    })
}
