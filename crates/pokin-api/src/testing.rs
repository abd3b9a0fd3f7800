//! In-memory [`Backend`] for tests: records every request and lets the test
//! decide when and how each one is answered.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::envelope::ApiPayload;
use crate::error::ApiError;
use crate::executor::{ApiReply, Backend, Ticket};
use crate::request::ApiRequest;

#[derive(Default)]
struct FakeState {
    next_ticket: u64,
    sent: Vec<(Ticket, ApiRequest)>,
    unanswered: VecDeque<Ticket>,
    ready: VecDeque<ApiReply>,
}

/// Cloneable handle; give one clone to the code under test and keep one.
#[derive(Clone, Default)]
pub struct FakeBackend {
    state: Rc<RefCell<FakeState>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Boxed clone, for code that owns a `Box<dyn Backend>`.
    pub fn boxed(&self) -> Box<dyn Backend> {
        Box::new(self.clone())
    }

    /// All requests submitted so far, in order.
    pub fn sent(&self) -> Vec<ApiRequest> {
        self.state.borrow().sent.iter().map(|(_, r)| r.clone()).collect()
    }

    pub fn sent_count(&self) -> usize {
        self.state.borrow().sent.len()
    }

    pub fn last_sent(&self) -> Option<ApiRequest> {
        self.state.borrow().sent.last().map(|(_, r)| r.clone())
    }

    /// Answer the oldest unanswered request. Returns false if none is waiting.
    pub fn reply_next(&self, result: Result<ApiPayload, ApiError>) -> bool {
        let mut state = self.state.borrow_mut();
        match state.unanswered.pop_front() {
            Some(ticket) => {
                state.ready.push_back(ApiReply { ticket, result });
                true
            }
            None => false,
        }
    }

    pub fn reply_ok(&self, payload: ApiPayload) -> bool {
        self.reply_next(Ok(payload))
    }

    pub fn reply_err(&self, message: &str) -> bool {
        self.reply_next(Err(ApiError::Business {
            status: 400,
            message: message.to_string(),
        }))
    }
}

impl Backend for FakeBackend {
    fn submit(&mut self, request: ApiRequest) -> Ticket {
        let mut state = self.state.borrow_mut();
        state.next_ticket += 1;
        let ticket = Ticket(state.next_ticket);
        state.sent.push((ticket, request));
        state.unanswered.push_back(ticket);
        ticket
    }

    fn poll(&mut self) -> Option<ApiReply> {
        self.state.borrow_mut().ready.pop_front()
    }
}
