//! Lexicographic k-subsets of `0..n`.

/// Iterator over the k-combinations of `0..n` in lexicographic order.
///
/// `combinations(n, 0)` yields the empty set once; `k > n` yields nothing.
#[derive(Debug, Clone)]
pub struct Combinations {
    n: usize,
    idx: Vec<usize>,
    done: bool,
}

pub fn combinations(n: usize, k: usize) -> Combinations {
    Combinations {
        n,
        idx: (0..k).collect(),
        done: k > n,
    }
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let out = self.idx.clone();
        let k = self.idx.len();
        match (0..k).rev().find(|&i| self.idx[i] < self.n - k + i) {
            Some(i) => {
                self.idx[i] += 1;
                for j in i + 1..k {
                    self.idx[j] = self.idx[j - 1] + 1;
                }
            }
            None => self.done = true,
        }
        Some(out)
    }
}

/// Pick the elements of `items` at each combination's positions.
pub fn choose<T: Clone>(items: &[T], k: usize) -> impl Iterator<Item = Vec<T>> + '_ {
    combinations(items.len(), k).map(move |c| c.into_iter().map(|i| items[i].clone()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexicographic_order() {
        let all: Vec<Vec<usize>> = combinations(4, 2).collect();
        assert_eq!(
            all,
            vec![vec![0, 1], vec![0, 2], vec![0, 3], vec![1, 2], vec![1, 3], vec![2, 3]]
        );
    }

    #[test]
    fn edge_sizes() {
        assert_eq!(combinations(3, 0).collect::<Vec<_>>(), vec![Vec::<usize>::new()]);
        assert_eq!(combinations(2, 3).count(), 0);
        assert_eq!(combinations(3, 3).collect::<Vec<_>>(), vec![vec![0, 1, 2]]);
        assert_eq!(combinations(10, 4).count(), 210);
    }

    #[test]
    fn choose_maps_items() {
        let picked: Vec<Vec<&str>> = choose(&["a", "b", "c"], 2).collect();
        assert_eq!(picked, vec![vec!["a", "b"], vec!["a", "c"], vec!["b", "c"]]);
    }
}
