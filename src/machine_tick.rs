use log::*;

/// Run one evaluation of a state machine and apply at most one transition.
///
/// Returns whether a transition happened. A tick never chains into the next
/// state's evaluation; the new state is evaluated on the following tick.
pub fn step_state_machine_result<S, F>(state: &mut S, label: &str, tick_fn: F) -> Result<bool, String>
where
    F: FnOnce(&mut S) -> Result<Option<S>, String>,
{
    match tick_fn(state)? {
        Some(new_state) => {
            *state = new_state;

            trace!("State machine '{}' transitioned", label);

            Ok(true)
        }
        None => Ok(false),
    }
}
