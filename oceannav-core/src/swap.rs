use std::mem;

use crate::view::CompareState;

/// Exchange the comparable fields of the primary and secondary views.
///
/// Dataset, variable, depth, time, start time, scale (`scale` ↔ `scale_1`)
/// and variable scale move across; quiver variables stay with their panel.
/// The caller publishes the result as a single state transition.
pub fn swap_views(state: &mut CompareState) {
    let (a, b) = (&mut state.primary, &mut state.secondary);
    mem::swap(&mut a.dataset, &mut b.dataset);
    mem::swap(&mut a.variable, &mut b.variable);
    mem::swap(&mut a.depth, &mut b.depth);
    mem::swap(&mut a.time, &mut b.time);
    mem::swap(&mut a.starttime, &mut b.starttime);
    mem::swap(&mut a.scale, &mut b.scale);
    mem::swap(&mut a.variable_scale, &mut b.variable_scale);
}
