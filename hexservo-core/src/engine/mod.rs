//! Servo engine control API
//!
//! [`ServoEngine`] ties the channel table to the pulse scheduler. It is built
//! with a `const fn` so a board can keep it in a `static`, and every method
//! takes `&self`: channel writes are atomic stores, while anything touching
//! the timer or the pins goes through a critical-section mutex shared with
//! the interrupt handler.

mod error;

pub use error::EngineError;

use core::cell::RefCell;

use embassy_sync::blocking_mutex::CriticalSectionMutex;
use embedded_hal::delay::DelayNs;
use portable_atomic::{AtomicBool, Ordering};

use hexservo_hal::{PinId, ServoPins, ServoTimer};

use crate::channel::{ChannelSlot, ChannelTable, ServoChannel};
use crate::config::EngineConfig;
use crate::scheduler::{PulseScheduler, SchedulerPhase};
use crate::units::{clamp_ticks, ticks_to_us, us_to_ticks};
use crate::{MAX_SERVOS, MAX_TARGET_MICROSECONDS};

/// Six-channel servo pulse engine bound to one timer and one pin bank
pub struct ServoEngine<T, P> {
    table: ChannelTable,
    started: AtomicBool,
    /// Some channel has `position != target`
    moving: AtomicBool,
    config: EngineConfig,
    scheduler: CriticalSectionMutex<RefCell<PulseScheduler<T, P>>>,
}

impl<T: ServoTimer, P: ServoPins> ServoEngine<T, P> {
    /// Create a stopped engine with no channels
    pub const fn new(timer: T, pins: P, config: EngineConfig) -> Self {
        Self {
            table: ChannelTable::new(),
            started: AtomicBool::new(false),
            moving: AtomicBool::new(false),
            config,
            scheduler: CriticalSectionMutex::new(RefCell::new(PulseScheduler::new(
                timer,
                pins,
                config.wraps_per_period,
            ))),
        }
    }

    /// Start (or resume) pulse generation
    ///
    /// With `Some(pins)` the channel table is replaced by `pins.len()` zeroed
    /// channels, servo `i` on `pins[i]`. The list is checked before anything
    /// changes, so an error leaves the engine exactly as it was. While
    /// running, the timer keeps its cadence and a pulse already in flight
    /// still falls on time, so no pin sees a truncated pulse; zeroed
    /// channels emit nothing from the next period on.
    ///
    /// With `None` every channel keeps its pin, target, position and speed;
    /// the timer is restarted only if the engine is stopped.
    pub fn start(&self, pins: Option<&[PinId]>) -> Result<(), EngineError> {
        self.config.validate().map_err(|err| {
            warn!("servo engine config rejected: {}", err);
            EngineError::from(err)
        })?;

        let outcome = self.scheduler.lock(|cell| -> Result<StartOutcome, EngineError> {
            let mut scheduler = cell.borrow_mut();
            let running = self.started.load(Ordering::Acquire);
            let outcome = match pins {
                Some(pins) => {
                    check_pins(pins, scheduler.pins())?;
                    self.table.assign(pins);
                    scheduler.configure_outputs(&self.table);
                    self.moving.store(false, Ordering::Relaxed);
                    if running {
                        return Ok(StartOutcome::Reconfigured);
                    }
                    StartOutcome::Started
                }
                None => {
                    if running {
                        return Ok(StartOutcome::AlreadyRunning);
                    }
                    self.moving.store(self.table.any_moving(), Ordering::Relaxed);
                    StartOutcome::Resumed
                }
            };
            scheduler.start();
            self.started.store(true, Ordering::Release);
            Ok(outcome)
        })?;

        let count = self.table.count();
        match outcome {
            StartOutcome::Started => info!("servo engine started, {} channels", count),
            StartOutcome::Reconfigured => info!("servo engine reconfigured, {} channels", count),
            StartOutcome::Resumed => info!("servo engine resumed, {} channels", count),
            StartOutcome::AlreadyRunning => trace!("servo engine already running"),
        }
        Ok(())
    }

    /// Stop pulse generation and drive every configured pin low
    ///
    /// Waits for a pulse in flight to finish, polling every
    /// `stop_poll_us` for at most `stop_timeout_us`, so no servo sees a
    /// truncated pulse. If the bound expires the pins are forced low anyway.
    pub fn stop<D: DelayNs>(&self, delay: &mut D) {
        if !self.is_started() {
            return;
        }

        let poll_us = self.config.stop_poll_us;
        let timeout_us = self.config.stop_timeout_us;
        let mut waited_us: u32 = 0;

        let forced = loop {
            let halted = self.scheduler.lock(|cell| {
                let mut scheduler = cell.borrow_mut();
                let in_flight = scheduler.pulse_in_flight();
                if in_flight && waited_us < timeout_us {
                    return None;
                }
                scheduler.halt(&self.table);
                self.started.store(false, Ordering::Release);
                self.moving.store(self.table.any_moving(), Ordering::Relaxed);
                Some(in_flight)
            });
            if let Some(forced) = halted {
                break forced;
            }
            delay.delay_us(poll_us);
            waited_us = waited_us.saturating_add(poll_us);
        };

        if forced {
            warn!("pulse still in flight after {} us, pins forced low", waited_us);
        } else {
            info!("servo engine stopped after {} us", waited_us);
        }
    }

    /// Timer interrupt entry point
    ///
    /// Call from the interrupt vector of the timer handed to [`Self::new`].
    pub fn on_timer_interrupt(&self) {
        self.scheduler
            .lock(|cell| cell.borrow_mut().service(&self.table, &self.moving));
    }

    /// Whether the timer is running
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Whether some channel is still ramping toward its target
    ///
    /// While running it turns false one period after the last channel
    /// arrives; while stopped it follows every target write.
    pub fn is_moving(&self) -> bool {
        self.moving.load(Ordering::Relaxed)
    }

    /// Number of configured channels
    pub fn servo_count(&self) -> usize {
        self.table.count()
    }

    /// Pin driven by a servo
    pub fn pin(&self, num: u8) -> Option<PinId> {
        self.table.get(usize::from(num)).map(ChannelSlot::pin)
    }

    /// Snapshot of one channel
    pub fn channel(&self, num: u8) -> Option<ServoChannel> {
        self.table.get(usize::from(num)).map(ChannelSlot::snapshot)
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Scheduler phase
    pub fn phase(&self) -> SchedulerPhase {
        self.scheduler.lock(|cell| cell.borrow().phase())
    }

    /// Periods started since construction (wrapping)
    pub fn periods(&self) -> u32 {
        self.scheduler.lock(|cell| cell.borrow().periods())
    }

    /// Command a pulse width in microseconds (clamped to 2500)
    pub fn set_target(&self, num: u8, us: u16) {
        if us > MAX_TARGET_MICROSECONDS {
            debug!("servo {} target {} us clamped", num, us);
        }
        self.set_target_high_res(num, us_to_ticks(us));
    }

    /// Command a pulse width in ticks of 1/24 µs (clamped to 60000)
    ///
    /// If the channel has no speed limit, is not pulsing yet, or the new
    /// target is 0, the position follows at once without waiting for the
    /// next period.
    pub fn set_target_high_res(&self, num: u8, ticks: u16) {
        let Some(slot) = self.slot(num) else {
            return;
        };
        let target = clamp_ticks(ticks);
        if target != ticks {
            debug!("servo {} target {} ticks clamped", num, ticks);
        }

        critical_section::with(|_| {
            slot.set_target(target);
            if slot.speed() == 0 || slot.position() == 0 || target == 0 {
                slot.set_position(target);
            }
            if slot.position() != target {
                self.moving.store(true, Ordering::Relaxed);
            } else if !self.started.load(Ordering::Acquire) {
                // No period start will refresh it while stopped
                self.moving.store(self.table.any_moving(), Ordering::Relaxed);
            }
        });
    }

    /// Commanded pulse width in microseconds
    pub fn get_target(&self, num: u8) -> u16 {
        self.slot(num).map_or(0, |slot| ticks_to_us(slot.target()))
    }

    /// Commanded pulse width in ticks
    pub fn get_target_high_res(&self, num: u8) -> u16 {
        self.slot(num).map_or(0, ChannelSlot::target)
    }

    /// Set the maximum change per period in ticks (0 = unlimited)
    pub fn set_speed(&self, num: u8, speed: u16) {
        if let Some(slot) = self.slot(num) {
            slot.set_speed(speed);
        }
    }

    /// Speed limit in ticks per period
    pub fn get_speed(&self, num: u8) -> u16 {
        self.slot(num).map_or(0, ChannelSlot::speed)
    }

    /// Pulse width being emitted, in microseconds
    pub fn get_position(&self, num: u8) -> u16 {
        self.slot(num).map_or(0, |slot| ticks_to_us(slot.position()))
    }

    /// Pulse width being emitted, in ticks
    pub fn get_position_high_res(&self, num: u8) -> u16 {
        self.slot(num).map_or(0, ChannelSlot::position)
    }

    fn slot(&self, num: u8) -> Option<&ChannelSlot> {
        let slot = self.table.get(usize::from(num));
        debug_assert!(
            slot.is_some(),
            "servo {} out of range ({} configured)",
            num,
            self.table.count()
        );
        slot
    }
}

/// What a `start` call did
enum StartOutcome {
    Started,
    Reconfigured,
    Resumed,
    AlreadyRunning,
}

/// Check a pin list against the driver's eligible set
fn check_pins<P: ServoPins>(pins: &[PinId], driver: &P) -> Result<(), EngineError> {
    if pins.len() > MAX_SERVOS {
        return Err(EngineError::TooManyServos);
    }
    for (i, &pin) in pins.iter().enumerate() {
        if !driver.is_eligible(pin) {
            return Err(EngineError::IneligiblePin(pin));
        }
        if pins[..i].contains(&pin) {
            return Err(EngineError::DuplicatePin(pin));
        }
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::testing::{FrozenDelay, Rig};
    use crate::MAX_TARGET_TICKS;

    #[test]
    fn test_unlimited_speed_moves_immediately() {
        let rig = Rig::new();
        let engine = rig.engine();
        engine.start(Some(&[2, 3])).unwrap();

        engine.set_speed(0, 0);
        engine.set_target(0, 1000);
        assert_eq!(engine.periods(), 0);
        assert_eq!(engine.get_position(0), 1000);
        assert_eq!(engine.get_position_high_res(0), 24000);
    }

    #[test]
    fn test_ramp_converges_at_speed() {
        let rig = Rig::new();
        let engine = rig.engine();
        engine.start(Some(&[2, 3])).unwrap();
        engine.set_target(0, 1000);

        engine.set_speed(0, 200);
        engine.set_target(0, 2000);
        assert!(engine.is_moving());
        assert_eq!(engine.get_position_high_res(0), 24000);

        for period in 1..=120u16 {
            rig.run_full_periods(&engine, 1);
            let position = engine.get_position_high_res(0);
            assert_eq!(position, 24000 + 200 * period);
            assert_eq!(rig.log.last_pulse(2).unwrap().width, u64::from(position));
        }
        assert_eq!(engine.get_position(0), 2000);
        // Sampled before the last step
        assert!(engine.is_moving());

        rig.run_periods(&engine, 1);
        assert!(!engine.is_moving());
        assert_eq!(rig.log.violations(), 0);
    }

    #[test]
    fn test_zero_target_stops_pulses() {
        let rig = Rig::new();
        let engine = rig.engine();
        engine.start(Some(&[2, 3])).unwrap();
        engine.set_target(1, 1500);
        engine.set_speed(1, 200);
        rig.run_full_periods(&engine, 1);
        assert_eq!(rig.log.last_pulse(3).unwrap().width, 36000);

        engine.set_target(1, 0);
        assert_eq!(engine.get_position(1), 0);

        rig.log.clear_pulses();
        rig.run_full_periods(&engine, 2);
        assert!(rig.log.pulses_for(3).is_empty());
        assert!(!rig.log.is_high(3));
    }

    #[test]
    fn test_stop_mid_pulse_completes_pulse() {
        let rig = Rig::new();
        let engine = rig.engine();
        engine.start(Some(&[2])).unwrap();
        engine.set_target(0, 2000);
        rig.run_periods(&engine, 1);
        rig.run_for(&engine, 100);
        assert!(rig.log.is_high(2));

        let mut delay = rig.delay(&engine);
        engine.stop(&mut delay);

        assert!(!engine.is_started());
        assert!(!rig.log.is_high(2));
        assert_eq!(rig.log.last_pulse(2).unwrap().width, 48000);
        assert!(delay.calls > 0);
        assert!(delay.calls * engine.config().stop_poll_us <= engine.config().stop_timeout_us);
        assert!(!rig.clock.is_running());
        assert_eq!(engine.phase(), SchedulerPhase::Halted);
    }

    #[test]
    fn test_stop_between_pulses_does_not_wait() {
        let rig = Rig::new();
        let engine = rig.engine();
        engine.start(Some(&[2, 3])).unwrap();
        engine.set_target(0, 1500);
        rig.run_full_periods(&engine, 1);

        let mut delay = rig.delay(&engine);
        engine.stop(&mut delay);
        assert_eq!(delay.calls, 0);
        assert!(!engine.is_started());

        // Already stopped
        engine.stop(&mut delay);
        assert_eq!(delay.calls, 0);
    }

    #[test]
    fn test_stop_forces_low_after_timeout() {
        let rig = Rig::new();
        let engine = rig.engine();
        engine.start(Some(&[2])).unwrap();
        engine.set_target(0, 2000);
        rig.run_periods(&engine, 1);

        // Time never passes, so the pulse never ends by itself
        let mut delay = FrozenDelay::default();
        engine.stop(&mut delay);

        assert_eq!(delay.calls, 280);
        assert!(!engine.is_started());
        assert!(!rig.log.is_high(2));
    }

    #[test]
    fn test_widths_and_ties() {
        let rig = Rig::new();
        let engine = rig.engine();
        engine.start(Some(&[2, 3, 4])).unwrap();
        engine.set_target_high_res(0, 30001);
        engine.set_target_high_res(1, 42000);
        engine.set_target_high_res(2, 42000);
        rig.run_full_periods(&engine, 1);

        let a = rig.log.last_pulse(2).unwrap();
        let b = rig.log.last_pulse(3).unwrap();
        let c = rig.log.last_pulse(4).unwrap();
        assert_eq!(a.width, 30001);
        assert_eq!(b.width, 42000);
        assert_eq!(b.rose_at + b.width, c.rose_at + c.width);
        assert_eq!(rig.log.violations(), 0);
    }

    #[test]
    fn test_resume_keeps_channels() {
        let rig = Rig::new();
        let engine = rig.engine();
        engine.start(Some(&[10, 11])).unwrap();
        engine.set_target(0, 1200);
        engine.set_target(1, 1800);
        engine.set_speed(1, 77);
        rig.run_full_periods(&engine, 1);

        let mut delay = rig.delay(&engine);
        engine.stop(&mut delay);
        rig.log.clear_pulses();

        engine.start(None).unwrap();
        assert!(engine.is_started());
        assert_eq!(rig.clock.start_count(), 2);
        assert_eq!(engine.servo_count(), 2);
        assert_eq!(engine.get_target(0), 1200);
        assert_eq!(engine.get_position(1), 1800);
        assert_eq!(engine.get_speed(1), 77);

        rig.run_full_periods(&engine, 1);
        assert_eq!(rig.log.last_pulse(10).unwrap().width, 1200 * 24);
        assert_eq!(rig.log.last_pulse(11).unwrap().width, 1800 * 24);
    }

    #[test]
    fn test_resume_while_running_is_noop() {
        let rig = Rig::new();
        let engine = rig.engine();
        engine.start(Some(&[2])).unwrap();
        engine.set_target(0, 1500);

        engine.start(None).unwrap();
        assert_eq!(rig.clock.start_count(), 1);
        assert_eq!(engine.get_target(0), 1500);
    }

    #[test]
    fn test_resume_recomputes_moving() {
        let rig = Rig::new();
        let engine = rig.engine();
        engine.start(Some(&[2])).unwrap();
        engine.set_target(0, 1000);
        engine.set_speed(0, 100);
        engine.set_target(0, 1100);

        let mut delay = rig.delay(&engine);
        engine.stop(&mut delay);
        assert!(engine.is_moving());

        engine.start(None).unwrap();
        assert!(engine.is_moving());
        rig.run_periods(&engine, 25);
        assert_eq!(engine.get_position(0), 1100);
        assert!(!engine.is_moving());
    }

    #[test]
    fn test_stopped_writes_update_moving() {
        let rig = Rig::new();
        let engine = rig.engine();
        engine.start(Some(&[2, 3])).unwrap();
        engine.set_target(0, 1000);
        engine.set_speed(0, 100);
        engine.set_target(0, 2000);
        rig.run_periods(&engine, 1);

        let mut delay = rig.delay(&engine);
        engine.stop(&mut delay);
        assert!(engine.is_moving());

        engine.set_target(0, 0);
        assert_eq!(engine.get_position(0), 0);
        assert!(!engine.is_moving());

        // Fast-path write converging directly
        engine.set_target(1, 1200);
        assert!(!engine.is_moving());

        engine.set_speed(1, 50);
        engine.set_target(1, 1500);
        assert!(engine.is_moving());
        engine.set_speed(1, 0);
        engine.set_target(1, 1500);
        assert!(!engine.is_moving());
    }

    #[test]
    fn test_restart_resets_table() {
        let rig = Rig::new();
        let engine = rig.engine();
        engine.start(Some(&[2, 3])).unwrap();
        engine.set_target(0, 1500);
        engine.set_speed(1, 40);
        rig.run_periods(&engine, 1);
        assert!(rig.log.is_high(2));

        engine.start(Some(&[4])).unwrap();
        assert!(rig.log.is_output(4));
        assert_eq!(engine.servo_count(), 1);
        assert_eq!(engine.pin(0), Some(4));
        assert_eq!(engine.pin(1), None);
        assert_eq!(
            engine.channel(0),
            Some(ServoChannel {
                pin: 4,
                target: 0,
                position: 0,
                speed: 0
            })
        );
        assert!(!engine.is_moving());

        // The pulse in flight on the dropped pin still ends on time
        rig.run_for(&engine, u64::from(MAX_TARGET_TICKS) + 1);
        assert!(!rig.log.is_high(2));
        assert_eq!(rig.log.last_pulse(2).unwrap().width, 36000);
    }

    #[test]
    fn test_reconfigure_while_running_keeps_pulse_whole() {
        let rig = Rig::new();
        let engine = rig.engine();
        engine.start(Some(&[2, 3])).unwrap();
        engine.set_target(0, 2000);
        rig.run_periods(&engine, 1);
        rig.run_for(&engine, 2400);
        assert!(rig.log.is_high(2));

        engine.start(Some(&[2, 3])).unwrap();
        assert!(engine.is_started());
        assert_eq!(rig.clock.start_count(), 1);
        assert!(rig.log.is_high(2));
        assert_eq!(engine.get_target(0), 0);

        rig.run_for(&engine, u64::from(MAX_TARGET_TICKS) + 1);
        assert_eq!(rig.log.last_pulse(2).unwrap().width, 48000);

        rig.log.clear_pulses();
        rig.run_full_periods(&engine, 2);
        assert!(rig.log.pulses_for(2).is_empty());
        assert_eq!(rig.log.violations(), 0);
    }

    #[test]
    fn test_rejects_bad_pin_lists() {
        let rig = Rig::new();
        let engine = rig.engine();
        engine.start(Some(&[2, 3])).unwrap();
        engine.set_target(1, 1500);

        assert_eq!(
            engine.start(Some(&[2, 3, 4, 10, 11, 12, 2])),
            Err(EngineError::TooManyServos)
        );
        assert_eq!(engine.start(Some(&[2, 5])), Err(EngineError::IneligiblePin(5)));
        assert_eq!(engine.start(Some(&[3, 4, 3])), Err(EngineError::DuplicatePin(3)));

        assert!(engine.is_started());
        assert_eq!(engine.servo_count(), 2);
        assert_eq!(engine.pin(1), Some(3));
        assert_eq!(engine.get_target(1), 1500);
        assert_eq!(rig.clock.start_count(), 1);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let rig = Rig::new();
        let engine = rig.engine_with(EngineConfig::new().with_wraps_per_period(0));
        assert_eq!(
            engine.start(Some(&[2])),
            Err(EngineError::InvalidConfig(ConfigError::ZeroWrapsPerPeriod))
        );
        assert!(!engine.is_started());
        assert_eq!(engine.servo_count(), 0);
    }

    #[test]
    fn test_empty_pin_list() {
        let rig = Rig::new();
        let engine = rig.engine();
        engine.start(Some(&[])).unwrap();
        assert!(engine.is_started());
        assert_eq!(engine.servo_count(), 0);
        rig.run_periods(&engine, 2);
        assert!(!engine.is_moving());
    }

    #[test]
    fn test_targets_clamp() {
        let rig = Rig::new();
        let engine = rig.engine();
        engine.start(Some(&[2])).unwrap();

        engine.set_target(0, 3000);
        assert_eq!(engine.get_target(0), 2500);

        engine.set_target_high_res(0, u16::MAX);
        assert_eq!(engine.get_target_high_res(0), MAX_TARGET_TICKS);
        assert_eq!(engine.get_position_high_res(0), MAX_TARGET_TICKS);
    }

    #[test]
    fn test_first_target_skips_ramp() {
        let rig = Rig::new();
        let engine = rig.engine();
        engine.start(Some(&[2])).unwrap();
        engine.set_speed(0, 100);

        engine.set_target(0, 1500);
        assert_eq!(engine.get_position(0), 1500);
        assert!(!engine.is_moving());
    }

    #[test]
    fn test_dropping_speed_limit_mid_ramp() {
        let rig = Rig::new();
        let engine = rig.engine();
        engine.start(Some(&[2])).unwrap();
        engine.set_target(0, 1000);
        engine.set_speed(0, 10);
        engine.set_target(0, 2000);
        rig.run_periods(&engine, 1);
        assert_eq!(engine.get_position_high_res(0), 24010);

        engine.set_speed(0, 0);
        assert_eq!(engine.get_position_high_res(0), 24010);
        rig.run_periods(&engine, 1);
        assert_eq!(engine.get_position_high_res(0), 48000);
    }

    #[test]
    fn test_microseconds_truncate() {
        let rig = Rig::new();
        let engine = rig.engine();
        engine.start(Some(&[2])).unwrap();
        engine.set_target_high_res(0, 36023);
        assert_eq!(engine.get_target(0), 1500);
        assert_eq!(engine.get_position(0), 1500);
    }

    #[test]
    fn test_high_res_round_trip() {
        let rig = Rig::new();
        let engine = rig.engine();
        engine.start(Some(&[2])).unwrap();
        for ticks in 0..=MAX_TARGET_TICKS {
            engine.set_target_high_res(0, ticks);
            assert_eq!(engine.get_target_high_res(0), ticks);
        }
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "out of range")]
    fn test_servo_number_out_of_range() {
        let rig = Rig::new();
        let engine = rig.engine();
        engine.start(Some(&[2, 3])).unwrap();
        engine.set_target(2, 1000);
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_servo_number_out_of_range_ignored() {
        let rig = Rig::new();
        let engine = rig.engine();
        engine.start(Some(&[2, 3])).unwrap();
        engine.set_target(2, 1000);
        assert_eq!(engine.get_target(2), 0);
        assert_eq!(engine.get_position(5), 0);
    }
}
