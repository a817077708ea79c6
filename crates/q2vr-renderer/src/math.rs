// math.rs -- 4x4 matrix helpers for the matrix stacks and HUD projection

/// Column-major 4x4 matrix, laid out the way GL expects it (`m[col][row]`).
pub type Mat4 = [[f32; 4]; 4];

pub const IDENTITY: Mat4 = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

#[inline]
pub fn identity() -> Mat4 {
    IDENTITY
}

/// `a * b`
pub fn mul(a: &Mat4, b: &Mat4) -> Mat4 {
    let mut out = [[0.0f32; 4]; 4];
    for (col, out_col) in out.iter_mut().enumerate() {
        for (row, value) in out_col.iter_mut().enumerate() {
            *value = (0..4).map(|k| a[k][row] * b[col][k]).sum();
        }
    }
    out
}

pub fn translate(x: f32, y: f32, z: f32) -> Mat4 {
    let mut m = IDENTITY;
    m[3][0] = x;
    m[3][1] = y;
    m[3][2] = z;
    m
}

/// glOrtho
pub fn ortho(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    let mut m = IDENTITY;
    m[0][0] = 2.0 / (right - left);
    m[1][1] = 2.0 / (top - bottom);
    m[2][2] = -2.0 / (far - near);
    m[3][0] = -(right + left) / (right - left);
    m[3][1] = -(top + bottom) / (top - bottom);
    m[3][2] = -(far + near) / (far - near);
    m
}

/// glFrustum
pub fn frustum(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    let mut m = [[0.0f32; 4]; 4];
    m[0][0] = 2.0 * near / (right - left);
    m[1][1] = 2.0 * near / (top - bottom);
    m[2][0] = (right + left) / (right - left);
    m[2][1] = (top + bottom) / (top - bottom);
    m[2][2] = -(far + near) / (far - near);
    m[2][3] = -1.0;
    m[3][2] = -2.0 * far * near / (far - near);
    m
}

/// Symmetric perspective projection shifted horizontally in clip space by
/// `offset` (the per-eye lens-centre offset for stereo).
pub fn perspective_offset(fov_y: f32, aspect: f32, near: f32, far: f32, offset: f32) -> Mat4 {
    let ymax = near * (fov_y.to_radians() * 0.5).tan();
    let xmax = ymax * aspect;
    let proj = frustum(-xmax, xmax, -ymax, ymax, near, far);
    mul(&translate(offset, 0.0, 0.0), &proj)
}

/// Transform a point (w = 1) and return the homogeneous result.
pub fn transform_point(m: &Mat4, p: [f32; 3]) -> [f32; 4] {
    let mut out = [0.0f32; 4];
    for (row, value) in out.iter_mut().enumerate() {
        *value = m[0][row] * p[0] + m[1][row] * p[1] + m[2][row] * p[2] + m[3][row];
    }
    out
}

/// Flat view for uniform upload.
#[inline]
pub fn as_slice(m: &Mat4) -> &[f32; 16] {
    bytemuck::cast_ref(m)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_mul_identity() {
        let t = translate(1.0, 2.0, 3.0);
        assert_eq!(mul(&IDENTITY, &t), t);
        assert_eq!(mul(&t, &IDENTITY), t);
    }

    #[test]
    fn test_translate_compose() {
        let m = mul(&translate(1.0, 0.0, 0.0), &translate(0.0, 2.0, 0.0));
        let p = transform_point(&m, [0.0, 0.0, 0.0]);
        assert!(approx(p[0], 1.0) && approx(p[1], 2.0) && approx(p[3], 1.0));
    }

    #[test]
    fn test_ortho_maps_corners() {
        let m = ortho(0.0, 640.0, 480.0, 0.0, -99999.0, 99999.0);
        let p = transform_point(&m, [0.0, 0.0, 0.0]);
        assert!(approx(p[0], -1.0) && approx(p[1], 1.0));
        let p = transform_point(&m, [640.0, 480.0, 0.0]);
        assert!(approx(p[0], 1.0) && approx(p[1], -1.0));
    }

    #[test]
    fn test_perspective_offset_shifts_x() {
        let centred = perspective_offset(90.0, 1.0, 0.24, 251.0, 0.0);
        let shifted = perspective_offset(90.0, 1.0, 0.24, 251.0, 0.1);
        let a = transform_point(&centred, [0.0, 0.0, -1.0]);
        let b = transform_point(&shifted, [0.0, 0.0, -1.0]);
        assert!(approx(a[0] / a[3], 0.0));
        assert!(approx(b[0] / b[3], 0.1));
    }

    #[test]
    fn test_as_slice_column_major() {
        let t = translate(4.0, 5.0, 6.0);
        let flat = as_slice(&t);
        assert_eq!(&flat[12..15], &[4.0, 5.0, 6.0]);
    }
}
