//! Small building blocks shared by the row model: pre-order flattening and
//! stable id generation.

/// Monotonic id source. Ids are never reused for the lifetime of a generator,
/// so a stale handle can never alias a newer row.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    next: u64,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator {
    pub fn new() -> Self {
        IdGenerator { next: 1 }
    }

    /// Returns a fresh id.
    pub fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// Lazy pre-order walk over a forest: a node is yielded before its children,
/// and a node's whole subtree is yielded before its next sibling.
///
/// Each item is `(node, depth)` with roots at depth 0. The iterator is
/// single-pass; callers collect it into an array when they need the order
/// more than once.
///
/// # Examples
///
/// ```
/// use livegrid::util::PreOrder;
///
/// // 0 -> [1, 2], 1 -> [3]
/// let children: Vec<Vec<usize>> = vec![vec![1, 2], vec![3], vec![], vec![]];
/// let order: Vec<(usize, usize)> =
///     PreOrder::new([0usize], |n: usize| children[n].clone()).collect();
/// assert_eq!(order, vec![(0, 0), (1, 1), (3, 2), (2, 1)]);
/// ```
pub struct PreOrder<N, F> {
    stack: Vec<(N, usize)>,
    children: F,
}

impl<N, F, C> PreOrder<N, F>
where
    N: Copy,
    F: FnMut(N) -> C,
    C: IntoIterator<Item = N>,
    C::IntoIter: DoubleEndedIterator,
{
    pub fn new<R>(roots: R, children: F) -> Self
    where
        R: IntoIterator<Item = N>,
        R::IntoIter: DoubleEndedIterator,
    {
        let stack = roots.into_iter().rev().map(|n| (n, 0)).collect();
        PreOrder { stack, children }
    }
}

impl<N, F, C> Iterator for PreOrder<N, F>
where
    N: Copy,
    F: FnMut(N) -> C,
    C: IntoIterator<Item = N>,
    C::IntoIter: DoubleEndedIterator,
{
    type Item = (N, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let (node, depth) = self.stack.pop()?;
        for child in (self.children)(node).into_iter().rev() {
            self.stack.push((child, depth + 1));
        }
        Some((node, depth))
    }
}
