use crate::internal::curve::CurveBN;
use crate::internal::errors::PreErrors;

pub fn to_hex(v: &[u8]) -> String {
  v.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Lagrange basis coefficient at x = 0 for the `i`-th index of `xs`:
/// the product over j != i of x_j / (x_j - x_i).
///
/// Fails if two indices coincide.
pub fn lambda_coeff(i: usize, xs: &[CurveBN]) -> Result<CurveBN, PreErrors> {
  let x_i = &xs[i];
  let mut res = CurveBN::from_u32(1, x_i.params())?;

  for (j, x_j) in xs.iter().enumerate() {
    if j != i {
      let denominator = (x_j - x_i).invert()?;
      res = &(&res * x_j) * &denominator;
    }
  }

  Ok(res)
}

/// Evaluates the polynomial whose coefficients are stored by degree
/// (`coeffs[k]` multiplies x^k), using Horner's rule.
pub fn poly_eval(coeffs: &[CurveBN], x: &CurveBN) -> CurveBN {
  let (last, rest) = coeffs
    .split_last()
    .expect("A polynomial has at least one coefficient");
  let mut res = last.clone();

  for coeff in rest.iter().rev() {
    res = &(&res * x) + coeff;
  }

  res
}
