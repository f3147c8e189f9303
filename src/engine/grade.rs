/// Converts a root-mean-square wind speed error (knots) into a letter grade.
///
/// | RMSE (kn)   | Grade |
/// |-------------|-------|
/// | <= 1.0      | A+    |
/// | <= 1.5      | A     |
/// | <= 2.0      | B     |
/// | <= 3.0      | C     |
/// | <= 4.0      | D     |
/// | > 4.0       | F     |
pub fn grade(rmse: f64) -> String {
    match rmse {
        e if e <= 1.0 => "A+".into(),
        e if e <= 1.5 => "A".into(),
        e if e <= 2.0 => "B".into(),
        e if e <= 3.0 => "C".into(),
        e if e <= 4.0 => "D".into(),
        _ => "F".into(),
    }
}
