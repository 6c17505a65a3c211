//! Contiguous-run partitioning over index tables.
//!
//! Structural notifications describe contiguous ranges, so every batch of
//! source items that enters or leaves a mapping is split into the smallest
//! number of proxy runs first. These helpers are pure: they only look at the
//! index tables and an ordering predicate.

/// Rebuilds the source-to-proxy table from `proxy_to_source`, starting at
/// proxy position `start`.
///
/// Entries for proxy positions before `start` are assumed to be correct
/// already. With `start == 0` the whole table is cleared first.
pub(crate) fn build_source_to_proxy(
    proxy_to_source: &[usize],
    source_to_proxy: &mut [Option<usize>],
    start: usize,
) {
    if start == 0 {
        source_to_proxy.fill(None);
    }
    for (proxy_item, &source_item) in proxy_to_source.iter().enumerate().skip(start) {
        source_to_proxy[source_item] = Some(proxy_item);
    }
}

/// Returns the inclusive proxy runs that `source_items` occupy.
///
/// Items that are not mapped are ignored. The runs come back sorted and
/// merged, so removing them back-to-front never invalidates a run that is
/// still pending.
pub(crate) fn proxy_intervals_for_removal(
    source_to_proxy: &[Option<usize>],
    source_items: &[usize],
) -> Vec<(usize, usize)> {
    let mut proxy_items: Vec<usize> = source_items
        .iter()
        .filter_map(|&item| source_to_proxy.get(item).copied().flatten())
        .collect();
    proxy_items.sort_unstable();
    proxy_items.dedup();
    contiguous_runs(&proxy_items)
}

/// Splits a sorted batch of new source items into insertion runs.
///
/// Returns `(proxy_position, items)` pairs. Positions refer to
/// `proxy_to_source` as it is *before* any run is inserted and never
/// decrease, so applying the runs front-to-back needs an offset equal to the
/// number of items already inserted.
///
/// `precedes(a, b)` must return `true` when source item `a` belongs before
/// source item `b` in proxy order. Each new item's position is found by
/// binary search; consecutive new items that do not pass the existing
/// neighbour at that position share its run.
pub(crate) fn proxy_intervals_for_insertion(
    proxy_to_source: &[usize],
    source_items: &[usize],
    mut precedes: impl FnMut(usize, usize) -> bool,
) -> Vec<(usize, Vec<usize>)> {
    let mut runs = Vec::new();
    let mut low = 0;
    let mut next = 0;
    while next < source_items.len() {
        let first = source_items[next];
        next += 1;

        let mut high = proxy_to_source.len();
        while low < high {
            let middle = low + (high - low) / 2;
            if precedes(first, proxy_to_source[middle]) {
                high = middle;
            } else {
                low = middle + 1;
            }
        }

        let mut batch = vec![first];
        if low >= proxy_to_source.len() {
            batch.extend_from_slice(&source_items[next..]);
            next = source_items.len();
        } else {
            let neighbour = proxy_to_source[low];
            while next < source_items.len() {
                let candidate = source_items[next];
                if precedes(neighbour, candidate) {
                    break;
                }
                batch.push(candidate);
                next += 1;
            }
        }
        runs.push((low, batch));
    }
    runs
}

/// Returns the lowest and highest proxy positions of the mapped items in
/// `source_items`, or `None` when none of them is mapped.
pub(crate) fn proxy_item_range(
    source_to_proxy: &[Option<usize>],
    source_items: &[usize],
) -> Option<(usize, usize)> {
    source_items
        .iter()
        .filter_map(|&item| source_to_proxy.get(item).copied().flatten())
        .fold(None, |range, proxy_item| match range {
            None => Some((proxy_item, proxy_item)),
            Some((low, high)) => Some((low.min(proxy_item), high.max(proxy_item))),
        })
}

/// Merges sorted, distinct positions into inclusive runs.
pub(crate) fn contiguous_runs(sorted: &[usize]) -> Vec<(usize, usize)> {
    let mut runs: Vec<(usize, usize)> = Vec::new();
    for &position in sorted {
        match runs.last_mut() {
            Some((_, end)) if *end + 1 == position => *end = position,
            _ => runs.push((position, position)),
        }
    }
    runs
}
