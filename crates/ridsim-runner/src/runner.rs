//! The tick loop.
//!
//! [`Runner`] owns one engine and one radio. It advances engine time in
//! fixed steps, answers control lines between ticks and rebuilds the engine
//! when a restart is requested.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

use crossbeam_channel::{Receiver, TryRecvError};
use metrics::{counter, histogram};
use ridsim_cli_protocol::LineCodec;
use ridsim_engine::{CommandAction, Engine, RadioTransmitter};
use ridsim_metrics::metric_defs;
use tracing::{debug, info, warn};

use crate::config::{RunnerConfig, RunnerResult};
use crate::realtime::{RealTimePacer, RealTimePacerStats};

/// Engine time between two ticks. Finer than every engine cadence.
pub const TICK_STEP_MS: u64 = 5;

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Engine time when the loop stopped.
    pub final_ms: u64,
    pub ticks: u64,
    pub commands: u64,
    pub restarts: u64,
    pub pacing: RealTimePacerStats,
}

/// Drives an engine against a radio.
pub struct Runner<R: RadioTransmitter> {
    config: RunnerConfig,
    engine: Engine,
    radio: R,
    now_ms: u64,
    ticks: u64,
    restarts: u64,
}

impl<R: RadioTransmitter> Runner<R> {
    pub fn new(config: RunnerConfig, radio: R) -> RunnerResult<Self> {
        let engine = config.build_engine(config.settings.clone())?;
        info!(
            "Runner: broadcasting '{}' in {} mode",
            engine.store().identity().uas_id,
            engine.settings().app_mode.as_label()
        );
        Ok(Runner {
            config,
            engine,
            radio,
            now_ms: 0,
            ticks: 0,
            restarts: 0,
        })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// Engine time of the next tick.
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn restarts(&self) -> u64 {
        self.restarts
    }

    /// Handle one control line and return the response line, if any.
    pub fn handle_line(&mut self, line: &str) -> RunnerResult<Option<String>> {
        let outcome = self.engine.handle_line(line);
        if outcome.action == CommandAction::Restart {
            self.restart()?;
        }
        Ok(outcome.response.map(|response| response.to_line()))
    }

    /// Rebuild the engine, keeping the settings written so far.
    fn restart(&mut self) -> RunnerResult<()> {
        let settings = self.engine.settings().clone();
        self.engine = self.config.build_engine(settings)?;
        self.restarts += 1;
        counter!(metric_defs::RESTARTS.name).increment(1);
        info!(
            "Runner: engine restarted at {} ms ('{}')",
            self.now_ms,
            self.engine.store().identity().uas_id
        );
        Ok(())
    }

    /// Run one tick and advance engine time by [`TICK_STEP_MS`].
    pub fn step(&mut self) {
        let start = Instant::now();
        self.engine.tick(self.now_ms, &mut self.radio);
        histogram!(metric_defs::TICK_TIME.name).record(start.elapsed().as_secs_f64() * 1e6);

        self.ticks += 1;
        self.now_ms += TICK_STEP_MS;
    }

    /// Tick until `stop` is raised or engine time reaches `until_ms`.
    ///
    /// Pending control lines are handled before every tick and responses are
    /// written to `output`. The loop keeps broadcasting after the control
    /// input closes.
    pub fn run(
        &mut self,
        control: &Receiver<String>,
        output: &mut dyn Write,
        pacer: &mut RealTimePacer,
        stop: &AtomicBool,
        until_ms: Option<u64>,
    ) -> RunnerResult<RunSummary> {
        let mut commands = 0;
        let mut input_open = true;

        while !stop.load(Ordering::SeqCst) {
            if until_ms.is_some_and(|end| self.now_ms >= end) {
                break;
            }

            while input_open {
                match control.try_recv() {
                    Ok(line) => {
                        commands += 1;
                        if let Some(response) = self.handle_line(&line)? {
                            output.write_all(&LineCodec::encode_line(&response))?;
                            output.flush()?;
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        debug!("Runner: control input closed at {} ms", self.now_ms);
                        input_open = false;
                    }
                }
            }

            self.step();

            if let Some(drift_ms) = pacer.check_lag_warning(self.now_ms) {
                warn!("Runner: {} ms behind the wall clock", drift_ms);
            }
            if let Some(sleep) = pacer.sleep_until(self.now_ms) {
                thread::sleep(sleep);
            }
        }

        let summary = RunSummary {
            final_ms: self.now_ms,
            ticks: self.ticks,
            commands,
            restarts: self.restarts,
            pacing: pacer.stats(),
        };
        info!(
            "Runner: stopped at {} ms after {} ticks, {} commands, {} restarts",
            summary.final_ms, summary.ticks, summary.commands, summary.restarts
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ridsim_engine::RecordingRadio;

    #[test]
    fn test_step_advances_time() {
        let mut runner = Runner::new(RunnerConfig::default(), RecordingRadio::new()).unwrap();
        for _ in 0..40 {
            runner.step();
        }
        assert_eq!(runner.now_ms(), 40 * TICK_STEP_MS);
        assert!(!runner.radio().sent.is_empty());
    }

    #[test]
    fn test_restart_keeps_written_settings() {
        let mut runner = Runner::new(RunnerConfig::default(), RecordingRadio::new()).unwrap();
        runner.handle_line("$SM|0|1|0|45|120|0").unwrap();
        let mac = runner.engine().settings().mac;

        let response = runner.handle_line("$R").unwrap();
        assert!(response.is_none());
        assert_eq!(runner.restarts(), 1);
        assert_eq!(runner.engine().settings().speed, 45);
        assert_eq!(runner.engine().settings().mac, mac);
    }

    #[test]
    fn test_unknown_line_is_nacked() {
        let mut runner = Runner::new(RunnerConfig::default(), RecordingRadio::new()).unwrap();
        assert_eq!(runner.handle_line("$Q").unwrap().as_deref(), Some("$-"));
    }
}
