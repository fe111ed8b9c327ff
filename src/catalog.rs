use ndarray::{Array1, Array2, ArrayView2};

use tracing::info;

use crate::{
    error::{Error, Result},
    map::{SkyMap, StokesMap},
    pixel::{nside2npix, PixelOrder},
    ud_grade::ud_grade,
};

/// Frequencies closer than this (GHz) are the same channel.
pub const FREQ_TOLERANCE_GHZ: f64 = 1e-6;

pub fn same_freq(a: f64, b: f64) -> bool {
    (a - b).abs() <= FREQ_TOLERANCE_GHZ * a.abs().max(b.abs()).max(1.0)
}

/// Survey maps keyed by frequency in GHz, kept sorted by frequency.
#[derive(Clone, Debug, Default)]
pub struct SurveyCatalog {
    entries: Vec<(f64, StokesMap)>,
}

impl SurveyCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, freq_ghz: f64, map: StokesMap) -> Result<()> {
        if self.get(freq_ghz).is_some() {
            return Err(Error::DuplicateFrequency(freq_ghz));
        }
        let pos = self.entries.partition_point(|(f, _)| *f < freq_ghz);
        self.entries.insert(pos, (freq_ghz, map));
        Ok(())
    }

    pub fn get(&self, freq_ghz: f64) -> Option<&StokesMap> {
        self.entries
            .iter()
            .find(|(f, _)| same_freq(*f, freq_ghz))
            .map(|(_, m)| m)
    }

    pub fn freqs(&self) -> Vec<f64> {
        self.entries.iter().map(|(f, _)| *f).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(f64, StokesMap)> {
        self.entries.iter()
    }
}

/// Frequency x pixel stack of every catalog map, RING ordered, rows sorted by
/// frequency. Missing data is NaN.
#[derive(Clone, Debug, PartialEq)]
pub struct FrequencyCube {
    pub nside: usize,
    pub freqs: Vec<f64>,
    pub i: Array2<f64>,
    pub qu: Option<(Array2<f64>, Array2<f64>)>,
}

fn ring_row(map: &SkyMap, nside: usize) -> Result<Vec<f64>> {
    Ok(ud_grade(&map.to_order(PixelOrder::Ring)?, nside)?.into_values())
}

impl FrequencyCube {
    pub fn from_catalog(catalog: &SurveyCatalog, nside: usize, include_pol: bool) -> Result<Self> {
        if catalog.is_empty() {
            return Err(Error::EmptyInput("survey catalog"));
        }
        let nfreq = catalog.len();
        let npix = nside2npix(nside);
        let mut i = Array2::from_elem((nfreq, npix), f64::NAN);
        let with_pol = include_pol && catalog.iter().any(|(_, m)| m.has_polarization());
        let mut qu = if with_pol {
            Some((
                Array2::from_elem((nfreq, npix), f64::NAN),
                Array2::from_elem((nfreq, npix), f64::NAN),
            ))
        } else {
            None
        };

        for (row, (_, m)) in catalog.iter().enumerate() {
            i.row_mut(row).assign(&Array1::from(ring_row(&m.i, nside)?));
            if let (Some((cq, cu)), Some((q, u))) = (qu.as_mut(), m.qu.as_ref()) {
                cq.row_mut(row).assign(&Array1::from(ring_row(q, nside)?));
                cu.row_mut(row).assign(&Array1::from(ring_row(u, nside)?));
            }
        }
        info!(
            "frequency cube: {} frequencies x {} pixels, polarization {}",
            nfreq, npix, with_pol
        );
        Ok(Self {
            nside,
            freqs: catalog.freqs(),
            i,
            qu,
        })
    }

    pub fn intensity(&self) -> ArrayView2<f64> {
        self.i.view()
    }

    pub fn nfreq(&self) -> usize {
        self.freqs.len()
    }

    pub fn npix(&self) -> usize {
        self.i.ncols()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::partition;

    fn flat(nside: usize, v: f64) -> StokesMap {
        StokesMap::intensity(SkyMap::filled(nside, PixelOrder::Ring, v).unwrap())
    }

    #[test]
    fn catalog_stays_sorted() {
        let mut cat = SurveyCatalog::new();
        cat.insert(30.0, flat(1, 3.0)).unwrap();
        cat.insert(0.408, flat(1, 1.0)).unwrap();
        cat.insert(1.42, flat(1, 2.0)).unwrap();
        assert_eq!(cat.freqs(), vec![0.408, 1.42, 30.0]);
    }

    #[test]
    fn near_equal_frequency_is_a_duplicate() {
        let mut cat = SurveyCatalog::new();
        cat.insert(0.1 + 0.2, flat(1, 1.0)).unwrap();
        assert!(cat.get(0.3).is_some());
        assert!(matches!(
            cat.insert(0.3, flat(1, 1.0)),
            Err(Error::DuplicateFrequency(_))
        ));
    }

    #[test]
    fn cube_rows_follow_frequencies() {
        let mut cat = SurveyCatalog::new();
        cat.insert(23.0, flat(2, 23.0)).unwrap();
        cat.insert(1.5, flat(4, 1.5)).unwrap();
        let q = SkyMap::filled(2, PixelOrder::Ring, 0.5).unwrap();
        let pol = StokesMap::polarized(
            SkyMap::filled(2, PixelOrder::Ring, 30.0).unwrap(),
            q.clone(),
            q,
        )
        .unwrap();
        cat.insert(30.0, pol).unwrap();

        let cube = FrequencyCube::from_catalog(&cat, 2, true).unwrap();
        assert_eq!(cube.i.dim(), (3, 48));
        for (row, &f) in cube.freqs.iter().enumerate() {
            assert!(cube.i.row(row).iter().all(|&v| v == f));
        }
        let (cq, _) = cube.qu.as_ref().unwrap();
        assert!(cq.row(0).iter().all(|v| v.is_nan()));
        assert!(cq.row(2).iter().all(|&v| v == 0.5));

        let no_pol = FrequencyCube::from_catalog(&cat, 2, false).unwrap();
        assert!(no_pol.qu.is_none());
    }

    #[test]
    fn zero_sample_is_a_hole_at_every_resolution() {
        let mut values = vec![3.0; 48];
        values[5] = 0.0;
        let mut cat = SurveyCatalog::new();
        cat.insert(1.42, StokesMap::intensity(SkyMap::new(values, PixelOrder::Ring).unwrap()))
            .unwrap();
        cat.insert(30.0, flat(2, 3.0)).unwrap();

        let same = FrequencyCube::from_catalog(&cat, 2, false).unwrap();
        assert!(same.i[(0, 5)].is_nan());
        assert_eq!(same.i.row(0).iter().filter(|v| v.is_nan()).count(), 1);
        assert_eq!(partition(same.intensity()).unwrap().len(), 2);

        let coarse = FrequencyCube::from_catalog(&cat, 1, false).unwrap();
        assert_eq!(coarse.i.row(0).iter().filter(|v| v.is_nan()).count(), 1);
        assert_eq!(partition(coarse.intensity()).unwrap().len(), 2);
    }
}
