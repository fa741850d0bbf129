use super::types::State;

/// States a task in `src` may move to.
pub fn allowed_transitions(src: State) -> &'static [State] {
    match src {
        State::Pending => &[State::Scheduled],
        State::Scheduled => &[State::Scheduled, State::Running, State::Failed],
        State::Running => &[State::Running, State::Completed, State::Failed],
        State::Completed | State::Failed => &[],
    }
}

pub fn valid_state_transition(src: State, dst: State) -> bool {
    allowed_transitions(src).contains(&dst)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [State; 5] = [
        State::Pending,
        State::Scheduled,
        State::Running,
        State::Completed,
        State::Failed,
    ];

    #[test]
    fn transition_table() {
        let legal = [
            (State::Pending, State::Scheduled),
            (State::Scheduled, State::Scheduled),
            (State::Scheduled, State::Running),
            (State::Scheduled, State::Failed),
            (State::Running, State::Running),
            (State::Running, State::Completed),
            (State::Running, State::Failed),
        ];

        for src in ALL {
            for dst in ALL {
                assert_eq!(
                    valid_state_transition(src, dst),
                    legal.contains(&(src, dst)),
                    "{src} -> {dst}"
                );
            }
        }
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for dst in ALL {
            assert!(!valid_state_transition(State::Completed, dst));
            assert!(!valid_state_transition(State::Failed, dst));
        }
    }

    #[test]
    fn only_scheduled_and_running_self_loop() {
        let loops: Vec<State> = ALL
            .into_iter()
            .filter(|s| valid_state_transition(*s, *s))
            .collect();
        assert_eq!(loops, vec![State::Scheduled, State::Running]);
    }
}
