use ndarray::{Array1, Array2, ArrayView1, Axis, s};
use rayon::prelude::*;

/// `Aᵗ·A`, parallel over columns of `A`.
/// Only the upper triangle is computed; the lower triangle is a copy, so the result is exactly symmetric.
pub fn compute_ata(a: &Array2<f64>) -> Array2<f64> {
    let n_params: usize = a.ncols();
    // Columns of `A` as contiguous rows
    let a_t: Array2<f64> = a.t().as_standard_layout().into_owned();

    let upper_rows: Vec<Array1<f64>> = (0..n_params)
        .into_par_iter()
        .map(|i_param: usize| {
            let column_i: ArrayView1<f64> = a_t.row(i_param);
            let row: Array1<f64> = Array1::from_iter((i_param..n_params).map(|j_param: usize| column_i.dot(&a_t.row(j_param))));
            return row;
        })
        .collect::<Vec<Array1<f64>>>();

    let mut ata: Array2<f64> = Array2::zeros((n_params, n_params));
    for (i_param, row) in upper_rows.iter().enumerate() {
        ata.slice_mut(s![i_param, i_param..]).assign(row);
        ata.slice_mut(s![i_param.., i_param]).assign(row);
    }

    return ata;
}

/// `A·m`, parallel over rows of `A`
pub fn operate(a: &Array2<f64>, m: &Array1<f64>) -> Array1<f64> {
    let am: Vec<f64> = a.axis_iter(Axis(0)).into_par_iter().map(|row: ArrayView1<f64>| row.dot(m)).collect::<Vec<f64>>();
    return Array1::from(am);
}

/// `Aᵗ·v`, parallel over columns of `A`
pub fn compute_atv(a: &Array2<f64>, v: &Array1<f64>) -> Array1<f64> {
    let atv: Vec<f64> = a.axis_iter(Axis(1)).into_par_iter().map(|column: ArrayView1<f64>| column.dot(v)).collect::<Vec<f64>>();
    return Array1::from(atv);
}

/// `Aᵗ·(A·p)` without forming `Aᵗ·A`
pub fn at_a_p(a: &Array2<f64>, p: &Array1<f64>) -> Array1<f64> {
    let ap: Array1<f64> = operate(a, p);
    return compute_atv(a, &ap);
}

#[test]
fn test_matrix_products() {
    // Lazy loading of packages which are not used anywhere else in the code
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    let a: Array2<f64> = array![[1.0, 2.0, 0.0], [0.0, -1.0, 3.0], [4.0, 0.5, 1.0], [2.0, 0.0, -2.0]];
    let p: Array1<f64> = array![0.3, -1.2, 2.0];

    let ata: Array2<f64> = compute_ata(&a);
    let precision: f64 = 1e-12;
    assert_abs_diff_eq!(ata, a.t().dot(&a), epsilon = precision);
    assert_eq!(ata, ata.t().to_owned());

    assert_abs_diff_eq!(operate(&a, &p), a.dot(&p), epsilon = precision);
    assert_abs_diff_eq!(at_a_p(&a, &p), a.t().dot(&a).dot(&p), epsilon = precision);
    assert_abs_diff_eq!(compute_atv(&a, &array![1.0, 1.0, 1.0, 1.0]), array![7.0, 1.5, 2.0], epsilon = precision);
}
