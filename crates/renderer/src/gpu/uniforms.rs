use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::pipeline::UNIFORM_BINDING;

/// std140 image of the `ColorParams` block: one `vec4`.
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ColorUniform {
    pub our_color: [f32; 4],
}

unsafe impl Zeroable for ColorUniform {}
unsafe impl Pod for ColorUniform {}

impl ColorUniform {
    /// Green channel pulsing with elapsed time; red and blue stay at zero.
    pub fn pulse(elapsed_seconds: f64) -> Self {
        Self {
            our_color: [0.0, oscillate(elapsed_seconds) as f32, 0.0, 1.0],
        }
    }
}

/// `sin(t) / 2 + 0.5`, mapping time onto `[0, 1]`.
pub fn oscillate(seconds: f64) -> f64 {
    seconds.sin() / 2.0 + 0.5
}

/// Buffer and bind group backing the color uniform.
pub(crate) struct UniformBlock {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    current: ColorUniform,
}

impl UniformBlock {
    pub fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout) -> Self {
        let current = ColorUniform::default();
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("color uniform buffer"),
            contents: bytemuck::bytes_of(&current),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("color uniform bind group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: UNIFORM_BINDING,
                resource: buffer.as_entire_binding(),
            }],
        });
        Self {
            buffer,
            bind_group,
            current,
        }
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    /// Queues a write only when the value changed since the last frame.
    pub fn set(&mut self, queue: &wgpu::Queue, value: ColorUniform) {
        if value == self.current {
            return;
        }
        self.current = value;
        queue.write_buffer(&self.buffer, 0, bytemuck::bytes_of(&value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn layout_matches_std140_vec4() {
        assert_eq!(std::mem::size_of::<ColorUniform>(), 16);
        assert_eq!(std::mem::align_of::<ColorUniform>(), 16);
    }

    #[test]
    fn oscillation_starts_at_midpoint() {
        assert!((oscillate(0.0) - 0.5).abs() < 1e-12);
        assert!((oscillate(PI / 2.0) - 1.0).abs() < 1e-12);
        assert!(oscillate(3.0 * PI / 2.0).abs() < 1e-12);
    }

    #[test]
    fn oscillation_stays_in_unit_range_and_repeats() {
        for step in 0..1000 {
            let t = f64::from(step) * 0.037;
            let value = oscillate(t);
            assert!((0.0..=1.0).contains(&value), "t={t} value={value}");
            assert!((value - oscillate(t + 2.0 * PI)).abs() < 1e-9);
        }
    }

    #[test]
    fn pulse_only_drives_green() {
        let color = ColorUniform::pulse(0.0);
        assert_eq!(color.our_color, [0.0, 0.5, 0.0, 1.0]);
    }
}
