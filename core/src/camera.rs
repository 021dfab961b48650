use cgmath::{InnerSpace, Matrix4, MetricSpace, Point3, SquareMatrix, Vector3};

use crate::common::{Aabb, Ray};

/// Remaps clip-space depth from [-1, 1] to [0, 1].
#[rustfmt::skip]
const DEPTH_ZERO_TO_ONE: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Size of the render target in physical pixels.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    /// Converts a pixel position (origin top-left, Y down) to normalized
    /// device coordinates (origin center, Y up).
    pub fn to_ndc(&self, x: f32, y: f32) -> (f32, f32) {
        let ndc_x = (x / self.width.max(1) as f32) * 2.0 - 1.0;
        let ndc_y = 1.0 - (y / self.height.max(1) as f32) * 2.0;
        (ndc_x, ndc_y)
    }
}

/// A pick camera: view pose plus projection.
///
/// NDC depth runs from 0 at the near plane to 1 at the far plane.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Camera {
    /// The position of the camera in world space.
    pub eye: Point3<f32>,
    /// The point the camera is looking at in world space.
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    /// The aspect ratio of the viewport (width / height).
    pub aspect: f32,
    /// Vertical field of view in degrees.
    pub fovy: f32,
    pub znear: f32,
    pub zfar: f32,
    /// When true, use orthographic projection instead of perspective.
    ///
    /// The orthographic view size is derived from the camera distance and fovy,
    /// so zoom (changing distance) works for both projection modes.
    pub ortho: bool,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Point3::new(0.0, 0.0, 10.0),
            target: Point3::new(0.0, 0.0, 0.0),
            up: Vector3::unit_y(),
            aspect: 1.0,
            fovy: 45.0,
            znear: 0.1,
            zfar: 1000.0,
            ortho: false,
        }
    }
}

impl Camera {
    /// Builds the combined view-projection matrix for this camera.
    pub fn build_view_projection_matrix(&self) -> Matrix4<f32> {
        let view = Matrix4::look_at_rh(self.eye, self.target, self.up);
        let proj = if self.ortho {
            let half_height = self.length() * (self.fovy.to_radians() / 2.0).tan();
            let half_width = half_height * self.aspect;
            cgmath::ortho(-half_width, half_width, -half_height, half_height, self.znear, self.zfar)
        } else {
            cgmath::perspective(cgmath::Deg(self.fovy), self.aspect, self.znear, self.zfar)
        };
        DEPTH_ZERO_TO_ONE * proj * view
    }

    pub fn forward(&self) -> Vector3<f32> {
        (self.target - self.eye).normalize()
    }

    pub fn right(&self) -> Vector3<f32> {
        self.forward().cross(self.up).normalize()
    }

    /// Distance from the eye to the target.
    pub fn length(&self) -> f32 {
        self.eye.distance(self.target)
    }

    /// Moves the camera along its current view direction so the whole box is
    /// in view, and adjusts the clipping planes to enclose it.
    pub fn fit_to_bounds(&mut self, bounds: &Aabb) {
        let center = bounds.center();
        let (size_x, size_y, size_z) = bounds.size();

        // Bounding sphere radius; keep a minimum so a flat or point-sized box still frames
        let bounding_radius =
            ((size_x * size_x + size_y * size_y + size_z * size_z).sqrt() / 2.0).max(1.0e-3);

        let half_fov_rad = (self.fovy / 2.0).to_radians();
        let vertical_distance = bounding_radius / half_fov_rad.sin();
        let half_hfov_rad = (half_fov_rad.tan() * self.aspect).atan();
        let horizontal_distance = bounding_radius / half_hfov_rad.sin();
        let distance = vertical_distance.max(horizontal_distance);

        let view_dir = if self.eye.distance(self.target) < 1e-6 {
            Vector3::new(0.0, 0.0, -1.0)
        } else {
            self.forward()
        };

        self.target = center;
        self.eye = center - view_dir * distance;
        self.znear = (distance * 0.001).max(0.001);
        self.zfar = (distance + bounding_radius) * 2.0;
    }

    /// Projects a world-space point to NDC.
    pub fn project_point_ndc(&self, world_point: Point3<f32>) -> Point3<f32> {
        let homogeneous = self.build_view_projection_matrix() * world_point.to_homogeneous();
        Point3::from_homogeneous(homogeneous)
    }

    /// Unprojects an NDC point to world space. `None` if the view-projection
    /// matrix is singular.
    pub fn unproject_point_ndc(&self, ndc_point: Point3<f32>) -> Option<Point3<f32>> {
        let inv_vp = self.build_view_projection_matrix().invert()?;
        Some(Point3::from_homogeneous(inv_vp * ndc_point.to_homogeneous()))
    }

    /// World-space ray through an NDC position, from the near plane towards
    /// the far plane.
    pub fn ray_from_ndc(&self, ndc_x: f32, ndc_y: f32) -> Option<Ray> {
        let near = self.unproject_point_ndc(Point3::new(ndc_x, ndc_y, 0.0))?;
        let far = self.unproject_point_ndc(Point3::new(ndc_x, ndc_y, 1.0))?;
        Ray::through(near, far)
    }

    /// World-space ray through a pixel position.
    pub fn ray_from_screen(&self, x: f32, y: f32, viewport: Viewport) -> Option<Ray> {
        let (ndc_x, ndc_y) = viewport.to_ndc(x, y);
        self.ray_from_ndc(ndc_x, ndc_y)
    }

    /// Pixel position of a world-space point. Z holds the NDC depth.
    pub fn project_point_screen(&self, world_point: Point3<f32>, viewport: Viewport) -> Point3<f32> {
        let ndc = self.project_point_ndc(world_point);
        Point3::new(
            (ndc.x + 1.0) * 0.5 * viewport.width as f32,
            (1.0 - ndc.y) * 0.5 * viewport.height as f32,
            ndc.z,
        )
    }
}
