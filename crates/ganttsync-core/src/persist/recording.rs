use std::collections::VecDeque;

use super::{PersistResponse, PersistenceClient, TransportError};
use crate::intent::PersistRequest;

/// In-memory client that records every request.
///
/// Scripted outcomes are returned first, in order. Once the script runs out,
/// creates are answered with increasing identifiers starting at `first_id`
/// and everything else with `{"success": true}`.
#[derive(Debug, Default)]
pub struct RecordingClient {
    sent: Vec<PersistRequest>,
    script: VecDeque<Result<PersistResponse, TransportError>>,
    next_id: u64,
}

impl RecordingClient {
    #[must_use]
    pub fn new(first_id: u64) -> Self {
        Self {
            next_id: first_id,
            ..Self::default()
        }
    }

    /// Queue the outcome of the next unscripted submit.
    pub fn script(&mut self, outcome: Result<PersistResponse, TransportError>) {
        self.script.push_back(outcome);
    }

    #[must_use]
    pub fn sent(&self) -> &[PersistRequest] {
        &self.sent
    }

    pub fn take_sent(&mut self) -> Vec<PersistRequest> {
        std::mem::take(&mut self.sent)
    }
}

impl PersistenceClient for RecordingClient {
    fn submit(&mut self, request: &PersistRequest) -> Result<PersistResponse, TransportError> {
        self.sent.push(request.clone());
        if let Some(outcome) = self.script.pop_front() {
            return outcome;
        }
        match request {
            PersistRequest::Create { .. } => {
                let id = self.next_id;
                self.next_id += 1;
                Ok(PersistResponse::with_id(id))
            }
            PersistRequest::Update { .. } | PersistRequest::Delete { .. } => {
                Ok(PersistResponse::ok())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ParentRef, TaskId};

    fn create() -> PersistRequest {
        PersistRequest::Create {
            name: "Design".into(),
            actual_start: "2017-05-02 09:00:00".into(),
            actual_end: "2017-05-02 17:00:00".into(),
            parent: ParentRef::Root,
        }
    }

    #[test]
    fn unscripted_creates_get_increasing_ids() {
        let mut client = RecordingClient::new(100);
        let first = client.submit(&create()).unwrap();
        let second = client.submit(&create()).unwrap();
        assert_eq!(first.assigned_id(), Some(TaskId::persistent("100")));
        assert_eq!(second.assigned_id(), Some(TaskId::persistent("101")));
        assert_eq!(client.sent().len(), 2);
    }

    #[test]
    fn script_takes_priority() {
        let mut client = RecordingClient::new(1);
        client.script(Err(TransportError::Transport("refused".into())));
        client.script(Ok(PersistResponse::failure("locked")));

        assert!(client.submit(&create()).is_err());
        assert!(!client.submit(&create()).unwrap().is_success());
        assert_eq!(
            client.submit(&create()).unwrap().assigned_id(),
            Some(TaskId::persistent("1"))
        );
        assert_eq!(client.take_sent().len(), 3);
        assert!(client.sent().is_empty());
    }
}
