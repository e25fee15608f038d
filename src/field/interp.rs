use crate::{
    field::{volume::Volume, voxel::Voxel},
    foundation::core::{DVec3, Interpolation},
};

#[derive(Clone, Debug)]
/// Continuously-addressable view over a [`Volume`].
///
/// Sampling happens in the volume's own voxel coordinates; composing with a
/// coordinate transform is the caller's concern. Values widen to f64 so that
/// one sampler type serves every element kind.
pub struct InterpView<T> {
    volume: Volume<T>,
    mode: Interpolation,
}

impl<T: Voxel> InterpView<T> {
    /// Wrap `volume` with the given interpolation mode.
    pub fn new(volume: Volume<T>, mode: Interpolation) -> Self {
        Self { volume, mode }
    }

    /// Interpolation mode of this view.
    pub fn mode(&self) -> Interpolation {
        self.mode
    }

    /// Underlying volume.
    pub fn volume(&self) -> &Volume<T> {
        &self.volume
    }

    /// Sample at a continuous position.
    pub fn sample(&self, p: DVec3) -> f64 {
        match self.mode {
            Interpolation::Nearest => self.volume.get(round_half_up(p)).to_f64(),
            Interpolation::Linear => self.trilinear(p),
        }
    }

    fn trilinear(&self, p: DVec3) -> f64 {
        let x0 = p.x.floor();
        let y0 = p.y.floor();
        let z0 = p.z.floor();
        let fx = p.x - x0;
        let fy = p.y - y0;
        let fz = p.z - z0;
        let (xi, yi, zi) = (x0 as i64, y0 as i64, z0 as i64);

        let mut acc = 0.0;
        for dz in 0..2i64 {
            let wz = if dz == 0 { 1.0 - fz } else { fz };
            for dy in 0..2i64 {
                let wy = if dy == 0 { 1.0 - fy } else { fy };
                for dx in 0..2i64 {
                    let wx = if dx == 0 { 1.0 - fx } else { fx };
                    let w = wx * wy * wz;
                    if w == 0.0 {
                        continue;
                    }
                    acc += w * self.volume.get([xi + dx, yi + dy, zi + dz]).to_f64();
                }
            }
        }
        acc
    }
}

fn round_half_up(p: DVec3) -> [i64; 3] {
    [
        (p.x + 0.5).floor() as i64,
        (p.y + 0.5).floor() as i64,
        (p.z + 0.5).floor() as i64,
    ]
}
