//! Background decode and render jobs.
//!
//! Each submission gets a generation number. Only the newest load and the
//! newest render are ever delivered; a completion for anything older is
//! dropped on arrival instead of overwriting newer state. A superseded job is
//! also told to stop, so it doesn't keep a core busy on work nobody will see.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, Sender};

use crate::audio::LoadedSignal;

use super::error::EngineResult;
use super::params::EffectParams;
use super::render;

pub enum JobOutcome {
    Loaded { name: String, result: EngineResult<LoadedSignal> },
    Rendered { result: EngineResult<Vec<u8>> },
}

/// Shared stop request for one background job.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

struct Pending {
    generation: u64,
    cancel: CancelFlag,
}

impl Pending {
    fn retire(self) {
        self.cancel.cancel();
    }
}

struct Completion {
    generation: u64,
    outcome: JobOutcome,
}

pub struct Jobs {
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
    next_generation: u64,
    latest_load: Option<Pending>,
    latest_render: Option<Pending>,
}

impl Default for Jobs {
    fn default() -> Self {
        Self::new()
    }
}

impl Jobs {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            tx,
            rx,
            next_generation: 0,
            latest_load: None,
            latest_render: None,
        }
    }

    // Claim the next generation for a slot, stopping whatever held it before
    fn claim(&mut self, render: bool) -> (u64, CancelFlag) {
        self.next_generation += 1;
        let pending = Pending { generation: self.next_generation, cancel: CancelFlag::default() };
        let claimed = (pending.generation, pending.cancel.clone());
        let slot = if render { &mut self.latest_render } else { &mut self.latest_load };
        if let Some(old) = slot.replace(pending) {
            log::debug!("superseding job {}", old.generation);
            old.retire();
        }
        claimed
    }

    pub fn submit_load(&mut self, name: String, extension: Option<String>, bytes: Vec<u8>, target_rate: u32) -> u64 {
        let (generation, cancel) = self.claim(false);
        let tx = self.tx.clone();
        std::thread::spawn(move || {
            let result = LoadedSignal::decode_with(bytes, extension.as_deref(), target_rate, &cancel);
            let _ = tx.send(Completion { generation, outcome: JobOutcome::Loaded { name, result } });
        });
        generation
    }

    pub fn submit_render(&mut self, signal: Arc<LoadedSignal>, params: EffectParams) -> u64 {
        let (generation, cancel) = self.claim(true);
        let tx = self.tx.clone();
        std::thread::spawn(move || {
            let result = render::render_wav(&signal, &params, &cancel);
            let _ = tx.send(Completion { generation, outcome: JobOutcome::Rendered { result } });
        });
        generation
    }

    pub fn is_loading(&self) -> bool {
        self.latest_load.is_some()
    }

    pub fn is_rendering(&self) -> bool {
        self.latest_render.is_some()
    }

    // Forget any outstanding load, e.g. when a file is installed directly
    pub fn cancel_load(&mut self) {
        if let Some(old) = self.latest_load.take() {
            old.retire();
        }
    }

    pub fn poll(&mut self) -> Vec<JobOutcome> {
        let mut out = Vec::new();
        while let Ok(done) = self.rx.try_recv() {
            let latest = match done.outcome {
                JobOutcome::Loaded { .. } => &mut self.latest_load,
                JobOutcome::Rendered { .. } => &mut self.latest_render,
            };
            if latest.as_ref().map(|p| p.generation) != Some(done.generation) {
                log::debug!("discarding stale job result (generation {})", done.generation);
                continue;
            }
            *latest = None;
            out.push(done.outcome);
        }
        out
    }
}
