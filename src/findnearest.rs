use crate::agent::*;

fn compare_distance(a: f32, b: f32) -> std::cmp::Ordering {
    a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal)
}

/// Straight-line nearest-neighbour helpers over any iterator of positioned
/// items. On equal distance the earliest item wins.
pub trait FindNearestItertools: Iterator {
    fn find_nearest_linear<V>(self, other_pos: Point) -> Option<V>
    where
        Self: Iterator<Item = V> + Sized,
        V: HasPosition,
    {
        self.map(|pos_object| (other_pos.distance_squared_to(pos_object.pos()), pos_object))
            .min_by(|(a, _), (b, _)| compare_distance(*a, *b))
            .map(|(_, pos_object)| pos_object)
    }

    /// Collect items ordered by distance to `other_pos`, closest first.
    /// The sort is stable so equally distant items keep their input order.
    fn sorted_by_distance_to<V>(self, other_pos: Point) -> Vec<V>
    where
        Self: Iterator<Item = V> + Sized,
        V: HasPosition,
    {
        let mut items: Vec<(f32, V)> = self
            .map(|pos_object| (other_pos.distance_squared_to(pos_object.pos()), pos_object))
            .collect();

        items.sort_by(|(a, _), (b, _)| compare_distance(*a, *b));

        items.into_iter().map(|(_, pos_object)| pos_object).collect()
    }
}

impl<T: ?Sized> FindNearestItertools for T where T: Iterator {}
