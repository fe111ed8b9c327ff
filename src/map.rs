use crate::{
    error::{Error, Result},
    pixel::{npix2nside, nside2depth, nside2npix, reorder, PixelOrder},
};

/// A sample carries data when it is finite and nonzero.
pub fn is_valid(x: f64) -> bool {
    x.is_finite() && x != 0.0
}

/// Full-sky HEALPix map. Missing data is stored as NaN.
#[derive(Clone, Debug, PartialEq)]
pub struct SkyMap {
    nside: usize,
    order: PixelOrder,
    values: Vec<f64>,
}

fn normalize(x: f64) -> f64 {
    if is_valid(x) {
        x
    } else {
        f64::NAN
    }
}

impl SkyMap {
    /// Zero and non-finite samples are stored as NaN.
    pub fn new(values: Vec<f64>, order: PixelOrder) -> Result<Self> {
        let nside = npix2nside(values.len())?;
        nside2depth(nside)?;
        Ok(Self {
            nside,
            order,
            values: values.into_iter().map(normalize).collect(),
        })
    }

    pub fn filled(nside: usize, order: PixelOrder, value: f64) -> Result<Self> {
        Self::new(vec![value; nside2npix(nside)], order)
    }

    pub fn nside(&self) -> usize {
        self.nside
    }

    pub fn order(&self) -> PixelOrder {
        self.order
    }

    pub fn npix(&self) -> usize {
        self.values.len()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    /// Pixels without data. Zeros never survive construction, so this is
    /// the NaN mask.
    pub fn bad_mask(&self) -> Vec<bool> {
        self.values.iter().map(|&x| !is_valid(x)).collect()
    }

    pub fn count_valid(&self) -> usize {
        self.values.iter().filter(|&&x| is_valid(x)).count()
    }

    pub fn to_order(&self, order: PixelOrder) -> Result<SkyMap> {
        if order == self.order {
            return Ok(self.clone());
        }
        Ok(SkyMap {
            nside: self.nside,
            order,
            values: reorder(&self.values, self.order, order)?,
        })
    }

    /// Same geometry, new samples.
    pub(crate) fn with_values(&self, values: Vec<f64>) -> Result<SkyMap> {
        if values.len() != self.values.len() {
            return Err(Error::ShapeMismatch {
                expected: (self.values.len(), 1),
                found: (values.len(), 1),
            });
        }
        SkyMap::new(values, self.order)
    }

    pub fn map_values<F>(&self, f: F) -> SkyMap
    where
        F: Fn(f64) -> f64,
    {
        SkyMap {
            nside: self.nside,
            order: self.order,
            values: self.values.iter().map(|&x| normalize(f(x))).collect(),
        }
    }
}

/// Intensity with optional linear polarization planes.
#[derive(Clone, Debug)]
pub struct StokesMap {
    pub i: SkyMap,
    pub qu: Option<(SkyMap, SkyMap)>,
}

impl StokesMap {
    pub fn intensity(i: SkyMap) -> Self {
        Self { i, qu: None }
    }

    /// Q and U are converted to the pixel order of `i`.
    pub fn polarized(i: SkyMap, q: SkyMap, u: SkyMap) -> Result<Self> {
        for p in [&q, &u] {
            if p.npix() != i.npix() {
                return Err(Error::ShapeMismatch {
                    expected: (i.npix(), 1),
                    found: (p.npix(), 1),
                });
            }
        }
        let q = q.to_order(i.order())?;
        let u = u.to_order(i.order())?;
        Ok(Self { i, qu: Some((q, u)) })
    }

    pub fn has_polarization(&self) -> bool {
        self.qu.is_some()
    }

    /// Applies `f` to every plane present.
    pub fn try_map_planes<F>(&self, mut f: F) -> Result<StokesMap>
    where
        F: FnMut(&SkyMap) -> Result<SkyMap>,
    {
        let i = f(&self.i)?;
        let qu = match &self.qu {
            Some((q, u)) => Some((f(q)?, f(u)?)),
            None => None,
        };
        Ok(StokesMap { i, qu })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeros_and_infinities_become_nan() {
        let mut values = vec![1.0; 12];
        values[3] = 0.0;
        values[4] = f64::INFINITY;
        let m = SkyMap::new(values, PixelOrder::Ring).unwrap();
        assert!(m.values()[3].is_nan());
        assert!(m.values()[4].is_nan());
        assert_eq!(m.count_valid(), 10);
        assert_eq!(m.bad_mask().iter().filter(|&&b| b).count(), 2);
    }

    #[test]
    fn mapped_zeros_become_nan() {
        let m = SkyMap::new((1..=48).map(|i| i as f64).collect(), PixelOrder::Nested).unwrap();
        let shifted = m.map_values(|x| x - 1.0);
        assert_eq!(shifted.nside(), 2);
        assert!(shifted.values()[0].is_nan());
        assert_eq!(shifted.count_valid(), 47);
    }

    #[test]
    fn rejects_bad_length() {
        assert!(SkyMap::new(vec![1.0; 10], PixelOrder::Ring).is_err());
        // nside=3 is a valid pixel count but not a power of two
        assert!(matches!(
            SkyMap::new(vec![1.0; 108], PixelOrder::Ring),
            Err(Error::InvalidNside(3))
        ));
    }

    #[test]
    fn polarized_requires_same_resolution() {
        let i = SkyMap::filled(2, PixelOrder::Ring, 1.0).unwrap();
        let q = SkyMap::filled(1, PixelOrder::Ring, 1.0).unwrap();
        assert!(matches!(
            StokesMap::polarized(i, q.clone(), q),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn polarized_planes_follow_intensity_order() {
        let i = SkyMap::filled(2, PixelOrder::Ring, 1.0).unwrap();
        let nested = SkyMap::new((1..=48).map(|v| v as f64).collect(), PixelOrder::Nested).unwrap();
        let s = StokesMap::polarized(i, nested.clone(), nested.clone()).unwrap();
        let (q, u) = s.qu.as_ref().unwrap();
        let expected = nested.to_order(PixelOrder::Ring).unwrap();
        assert_eq!(q, &expected);
        assert_eq!(u, &expected);
    }
}
