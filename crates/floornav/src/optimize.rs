use crate::{Floors, position::FloorPosition, walker::WalkStep};

impl Floors {
    /// Shortcuts a walked route wherever a straight line stays on the floor.
    ///
    /// From each step, the farthest later step whose triangle the line reaches without leaving
    /// the floor replaces everything in between. The result never has more steps than `route`
    /// and keeps its first and last steps unchanged.
    pub fn optimize_route(&self, route: Vec<WalkStep>) -> Vec<WalkStep> {
        let len = route.len();
        if len < 3 {
            return route;
        }

        let mut optimized = Vec::with_capacity(len);
        let mut i = 0;
        while i < len - 1 {
            let cur = &route[i];
            let mut k = len - 1;
            while k > i + 1 {
                if let Some(shortcut) = self.probe_shortcut(cur, &route[k]) {
                    // Interior vertices of the probe are the slope changes along the shortcut.
                    if shortcut.len() - 1 <= k - i {
                        optimized.push(*cur);
                        optimized.extend_from_slice(&shortcut[1..shortcut.len() - 1]);
                        break;
                    }
                }
                k -= 1;
            }
            if k == i + 1 {
                optimized.push(*cur);
            }
            i = k;
        }
        optimized.push(route[len - 1]);

        self.remove_duplicate_steps(&mut optimized);
        optimized
    }

    /// Marches from `from` toward `to`, extended far past it so every edge on the way is crossed
    /// decisively, and stops on entering `to`'s triangle.
    fn probe_shortcut(&self, from: &WalkStep, to: &WalkStep) -> Option<Vec<WalkStep>> {
        let dir = (to.pos - from.pos).normalize_or_zero();
        if dir == glam::Vec3::ZERO {
            return None;
        }
        let target = FloorPosition {
            pos: from.pos + dir * self.config.probe_extension,
            floor: to.floor,
            tri: to.tri,
            ..Default::default()
        };
        self.find_direct_route(&FloorPosition::from(from), &target)
    }

    fn remove_duplicate_steps(&self, route: &mut Vec<WalkStep>) {
        let epsilon = self.config.duplicate_epsilon;
        let mut i = 0;
        while i + 1 < route.len() {
            if !route[i].pos.abs_diff_eq(route[i + 1].pos, epsilon) {
                i += 1;
                continue;
            }
            if i + 2 < route.len() {
                route.remove(i + 1);
            } else if i > 0 {
                // Keep the end point; drop the step leading into it.
                route.remove(i);
            } else {
                break;
            }
        }
    }
}
