//! Property tests for the timer state machine.

use pomosync_core::{Event, PomodoroTimer, SessionKind, TimerSettings, TimerState};
use proptest::prelude::*;

const T0: u64 = 1_700_000_000_000;

#[derive(Debug, Clone)]
enum Op {
    Start,
    Pause,
    Resume,
    Toggle,
    Reset,
    Skip,
    Tick,
    Advance(u64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Start),
        Just(Op::Pause),
        Just(Op::Resume),
        Just(Op::Toggle),
        Just(Op::Reset),
        Just(Op::Skip),
        Just(Op::Tick),
        (0u64..3_700_000).prop_map(Op::Advance),
    ]
}

fn any_settings() -> impl Strategy<Value = TimerSettings> {
    (1u32..=60, 1u32..=30, 1u32..=60, any::<bool>(), 1u32..=6).prop_map(
        |(work, short, long, auto, every)| TimerSettings {
            work_duration: work,
            short_break_duration: short,
            long_break_duration: long,
            auto_start_breaks: auto,
            cycles_before_long_break: every,
        },
    )
}

fn apply(timer: &mut PomodoroTimer, op: &Op, now: &mut u64) -> Option<Event> {
    match op {
        Op::Start => timer.start_at(*now),
        Op::Pause => timer.pause_at(*now),
        Op::Resume => timer.resume_at(*now),
        Op::Toggle => timer.toggle_at(*now),
        Op::Reset => timer.reset_at(*now),
        Op::Skip => timer.skip_at(*now),
        Op::Tick => timer.tick_at(*now),
        Op::Advance(ms) => {
            *now += ms;
            None
        }
    }
}

proptest! {
    #[test]
    fn state_stays_consistent(settings in any_settings(), ops in prop::collection::vec(op(), 0..60)) {
        let mut timer = PomodoroTimer::new(settings);
        let mut now = T0;
        let mut last_cycles = 0;

        for op in &ops {
            let event = apply(&mut timer, op, &mut now);

            prop_assert!(timer.time_left_secs() <= timer.total_secs());
            prop_assert!(timer.cycles() >= last_cycles);
            last_cycles = timer.cycles();
            prop_assert_eq!(
                timer.state() == TimerState::Running,
                timer.expected_end_ms().is_some()
            );
            prop_assert_eq!(
                timer.snapshot().expected_end_time.is_some(),
                timer.state() == TimerState::Running
            );

            if let Some(Event::SessionCompleted { kind, cycles, next, .. }) = event {
                if kind == SessionKind::Work {
                    let every = settings.cycles_before_long_break;
                    let expected = if cycles % every == 0 {
                        SessionKind::LongBreak
                    } else {
                        SessionKind::ShortBreak
                    };
                    prop_assert_eq!(next, expected);
                } else {
                    prop_assert_eq!(next, SessionKind::Work);
                }
            }
        }
    }

    #[test]
    fn remaining_time_does_not_depend_on_tick_rate(
        work in 2u32..=60,
        ticks in prop::collection::vec(1u64..5_000, 1..40),
    ) {
        let settings = TimerSettings { work_duration: work, ..TimerSettings::default() };
        let mut often = PomodoroTimer::new(settings);
        let mut once = PomodoroTimer::new(settings);
        often.start_at(T0);
        once.start_at(T0);

        let mut now = T0;
        for step in &ticks {
            now += step;
            often.tick_at(now);
        }
        once.tick_at(now);

        prop_assert_eq!(often.time_left_secs(), once.time_left_secs());
        prop_assert_eq!(often.state(), once.state());
        prop_assert_eq!(often.kind(), once.kind());
    }

    #[test]
    fn snapshot_restores_to_same_state(settings in any_settings(), ops in prop::collection::vec(op(), 0..40)) {
        let mut timer = PomodoroTimer::new(settings);
        let mut now = T0;
        for op in &ops {
            apply(&mut timer, op, &mut now);
        }
        timer.tick_at(now);

        let snapshot = timer.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let (restored, missed) =
            PomodoroTimer::restore_at(settings, serde_json::from_str(&json).unwrap(), now);

        prop_assert!(missed.is_none());
        prop_assert_eq!(restored.snapshot(), snapshot);
    }
}
