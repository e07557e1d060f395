//! Polynomial feature expansion without a bias column.

use ndarray::Array2;

/// All monomials of total degree `1..=degree` over the input columns.
///
/// Terms are ordered by degree, then lexicographically by input index, so
/// degree 2 over `[a, b]` yields `a, b, a^2, a b, b^2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolynomialFeatures {
    n_inputs: usize,
    terms: Vec<Vec<usize>>,
}

impl PolynomialFeatures {
    pub fn new(degree: usize, n_inputs: usize) -> Self {
        let mut terms = Vec::new();
        for d in 1..=degree {
            let mut current = Vec::with_capacity(d);
            push_combinations(0, n_inputs, d, &mut current, &mut terms);
        }
        Self { n_inputs, terms }
    }

    pub fn n_inputs(&self) -> usize {
        self.n_inputs
    }

    pub fn n_outputs(&self) -> usize {
        self.terms.len()
    }

    /// Output column names, `a^2` for powers and `a b` for products.
    pub fn feature_names(&self, inputs: &[String]) -> Vec<String> {
        self.terms
            .iter()
            .map(|term| {
                let mut parts: Vec<String> = Vec::new();
                let mut i = 0;
                while i < term.len() {
                    let idx = term[i];
                    let mut power = 1;
                    while i + power < term.len() && term[i + power] == idx {
                        power += 1;
                    }
                    let name = inputs
                        .get(idx)
                        .cloned()
                        .unwrap_or_else(|| format!("x{idx}"));
                    if power == 1 {
                        parts.push(name);
                    } else {
                        parts.push(format!("{name}^{power}"));
                    }
                    i += power;
                }
                parts.join(" ")
            })
            .collect()
    }

    /// Expands `x` (`n × n_inputs`) into `n × n_outputs`.
    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        Array2::from_shape_fn((x.nrows(), self.terms.len()), |(i, t)| {
            self.terms[t].iter().map(|&j| x[[i, j]]).product()
        })
    }
}

fn push_combinations(
    start: usize,
    n: usize,
    remaining: usize,
    current: &mut Vec<usize>,
    out: &mut Vec<Vec<usize>>,
) {
    if remaining == 0 {
        out.push(current.clone());
        return;
    }
    for idx in start..n {
        current.push(idx);
        push_combinations(idx, n, remaining - 1, current, out);
        current.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_degree_two_output_count() {
        let poly = PolynomialFeatures::new(2, 22);
        assert_eq!(poly.n_outputs(), 22 + 22 * 23 / 2);
    }

    #[test]
    fn test_degree_two_names_and_order() {
        let poly = PolynomialFeatures::new(2, 3);
        assert_eq!(
            poly.feature_names(&names(&["a", "b", "c"])),
            names(&["a", "b", "c", "a^2", "a b", "a c", "b^2", "b c", "c^2"])
        );
    }

    #[test]
    fn test_degree_three_names() {
        let poly = PolynomialFeatures::new(3, 2);
        let out = poly.feature_names(&names(&["a", "b"]));
        assert_eq!(out[5..], names(&["a^3", "a^2 b", "a b^2", "b^3"]));
    }

    #[test]
    fn test_transform_values() {
        let poly = PolynomialFeatures::new(2, 2);
        let x = array![[2.0, 3.0], [-1.0, 0.5]];
        let out = poly.transform(&x);

        assert_eq!(out.row(0).to_vec(), vec![2.0, 3.0, 4.0, 6.0, 9.0]);
        assert_eq!(out.row(1).to_vec(), vec![-1.0, 0.5, 1.0, -0.5, 0.25]);
    }

    #[test]
    fn test_degree_one_is_identity() {
        let poly = PolynomialFeatures::new(1, 2);
        let x = array![[2.0, 3.0]];
        assert_eq!(poly.transform(&x), x);
    }
}
