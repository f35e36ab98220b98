//! Quickening of a whole compilation unit
//!
//! Most code items belong to a single method, and whichever worker compiles that method owns the
//! code item outright while quickening it (see [`compile_method`](super::compile_method)). Code
//! items shared by several method declarations are different: every sharer must agree on how the
//! bytes get quickened. The session owns those code items and arbitrates between sharers:
//!
//!   1. the first sharer quickens the code item and its result is recorded
//!   2. each later sharer replays the quickening against the recorded table; if it would have
//!      produced anything different, the code item becomes _conflicting_
//!   3. once conflicting, further sharers are noted but never quickened
//!
//! When the session finishes, conflicting code items are dequickened and the compiled artifacts
//! of all their sharers must be thrown away.

use super::compiler::check_replay_reproduces;
use super::{
    dequicken, quicken, replay, CompilationUnit, QuickenTable, QuickenedMethod, Resolver,
};
use crate::dex::{CodeItem, CodeItemId, MethodDecl, MethodReference};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

/// What is known about the quickening of one shared code item
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct QuickenState {
    /// Every sharer that was compiled so far, in the order they were compiled
    pub methods: Vec<MethodReference>,

    /// Table recorded by the first sharer
    pub quicken_data: Vec<u8>,

    /// Whether the first sharer rewrote `return-void`
    pub optimized_return_void: bool,

    /// Set once some sharer disagreed with the recorded quickening
    pub conflict: bool,
}

struct SharedCodeItem {
    code: CodeItem,
    state: Option<QuickenState>,
}

struct SessionState {
    /// Methods registered for quickening
    marked: HashSet<MethodReference>,

    shared: HashMap<CodeItemId, SharedCodeItem>,
}

/// Outcome of finishing a session
#[derive(Default, Debug)]
pub struct SweepReport {
    /// Shared code items that were restored to their original instructions
    pub unquickened: Vec<CodeItemId>,

    /// Methods whose compiled artifacts are no longer valid and must not be persisted
    pub discarded_methods: Vec<MethodReference>,
}

/// Quickening state for one compilation unit, shared by all the workers compiling it
pub struct QuickeningSession {
    /// Fixed at creation, so it can be consulted without locking
    shared_ids: HashSet<CodeItemId>,

    state: Mutex<SessionState>,
}

impl QuickeningSession {
    /// Start a session over the given method declarations
    ///
    /// Code items referenced by more than one declaration are moved out of `code_items` and into
    /// the session, until [`QuickeningSession::finish`] hands them back.
    pub fn new(
        methods: &[MethodDecl],
        code_items: &mut HashMap<CodeItemId, CodeItem>,
    ) -> QuickeningSession {
        let mut references: HashMap<CodeItemId, usize> = HashMap::new();
        for decl in methods {
            *references.entry(decl.code_item).or_insert(0) += 1;
        }

        let mut shared = HashMap::new();
        for (id, count) in references {
            if count < 2 {
                continue;
            }
            if let Some(code) = code_items.remove(&id) {
                shared.insert(id, SharedCodeItem { code, state: None });
            }
        }
        log::debug!(
            "Quickening session over {} methods, {} shared code items",
            methods.len(),
            shared.len()
        );

        QuickeningSession {
            shared_ids: shared.keys().copied().collect(),
            state: Mutex::new(SessionState {
                marked: HashSet::new(),
                shared,
            }),
        }
    }

    /// Register a method for quickening
    ///
    /// Registering the same method twice is a bug in the caller.
    pub fn mark_for_compilation(&self, method: MethodReference) {
        let mut state = self.state.lock();
        let newly_marked = state.marked.insert(method);
        assert!(newly_marked, "{:?} marked for quickening twice", method);
    }

    pub fn should_compile_method(&self, method: MethodReference) -> bool {
        self.state.lock().marked.contains(&method)
    }

    /// Number of methods registered for quickening
    pub fn num_code_items_to_quicken(&self) -> usize {
        self.state.lock().marked.len()
    }

    /// Is this code item shared (and therefore owned by the session)?
    pub fn is_shared(&self, id: CodeItemId) -> bool {
        self.shared_ids.contains(&id)
    }

    /// Quicken a shared code item on behalf of one of its sharers
    ///
    /// Returns the compiled artifact, or `None` if the method ends up not quickened: the unit's
    /// settings disable shared code items, quickening changed nothing, or the sharers disagree.
    ///
    /// Panics if the code item is not shared.
    pub fn quicken_shared<R: Resolver + ?Sized>(
        &self,
        unit: &CompilationUnit<'_, R>,
        id: CodeItemId,
    ) -> Option<QuickenedMethod> {
        if !unit.settings.quicken_shared_code_items {
            return None;
        }

        // One critical section per sharer, from compiling to comparing
        let mut state = self.state.lock();
        let shared = match state.shared.get_mut(&id) {
            Some(shared) => shared,
            None => panic!("{:?} is not a shared code item", id),
        };

        if let Some(existing) = shared.state.as_mut() {
            existing.methods.push(unit.method);
            if existing.conflict {
                return None;
            }

            let table = QuickenTable::new(&existing.quicken_data)
                .expect("quicken data produced by encoding");
            let outcome = replay(unit, &shared.code, table);
            let quicken_data = outcome.encode();
            if quicken_data != existing.quicken_data
                || outcome.optimized_return_void != existing.optimized_return_void
            {
                log::debug!(
                    "Quickening of {:?} disagrees with {:?} over shared code item {:?}",
                    unit.method,
                    existing.methods[0],
                    id
                );
                existing.conflict = true;
                return None;
            }
            if !outcome.modified_code() {
                return None;
            }
            return Some(QuickenedMethod {
                method: unit.method,
                quicken_data,
            });
        }

        let outcome = quicken(unit, &mut shared.code);
        let quicken_data = outcome.encode();
        if cfg!(debug_assertions) {
            check_replay_reproduces(unit, &shared.code, &quicken_data);
        }
        shared.state = Some(QuickenState {
            methods: vec![unit.method],
            quicken_data: quicken_data.clone(),
            optimized_return_void: outcome.optimized_return_void,
            conflict: false,
        });

        if !outcome.modified_code() {
            return None;
        }
        Some(QuickenedMethod {
            method: unit.method,
            quicken_data,
        })
    }

    /// Snapshot of what is known about a shared code item
    pub fn quicken_state(&self, id: CodeItemId) -> Option<QuickenState> {
        self.state
            .lock()
            .shared
            .get(&id)
            .and_then(|shared| shared.state.clone())
    }

    /// Current instructions of a shared code item
    pub fn shared_code(&self, id: CodeItemId) -> Option<CodeItem> {
        self.state.lock().shared.get(&id).map(|shared| shared.code.clone())
    }

    /// End the session, once every worker is done quickening
    ///
    /// Conflicting code items are restored to their original instructions (including
    /// `return-void`), and every shared code item goes back into `code_items`.
    pub fn finish(self, code_items: &mut HashMap<CodeItemId, CodeItem>) -> SweepReport {
        let mut report = SweepReport::default();
        let state = self.state.into_inner();

        for (id, mut shared) in state.shared {
            if let Some(quickened) = shared.state.filter(|quickened| quickened.conflict) {
                let table = QuickenTable::new(&quickened.quicken_data)
                    .expect("quicken data produced by encoding");
                dequicken(&mut shared.code, table, true);
                log::debug!(
                    "Unquickened conflicting shared code item {:?} (sharers: {:?})",
                    id,
                    quickened.methods
                );
                report.unquickened.push(id);
                report.discarded_methods.extend(quickened.methods);
            }
            code_items.insert(id, shared.code);
        }

        report.unquickened.sort();
        report.discarded_methods.sort();
        report
    }
}
