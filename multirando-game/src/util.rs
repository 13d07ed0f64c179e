use std::hash::Hash;

use hashbrown::HashMap;

pub fn sorted_hashmap_iter<T, U>(hashmap: &HashMap<T, U>) -> impl Iterator<Item = (&T, &U)>
where
    T: Ord + Hash,
{
    let mut keys: Vec<&T> = hashmap.keys().collect();
    keys.sort();
    keys.into_iter().map(|k| (k, &hashmap[k]))
}

/// Tally of how often each key occurs, in ascending key order (for stable log output).
pub fn sorted_counts<T, I>(keys: I) -> Vec<(T, usize)>
where
    T: Ord + Hash + Copy,
    I: IntoIterator<Item = T>,
{
    let mut counts: HashMap<T, usize> = HashMap::new();
    for k in keys {
        *counts.entry(k).or_insert(0) += 1;
    }
    sorted_hashmap_iter(&counts).map(|(&k, &v)| (k, v)).collect()
}
