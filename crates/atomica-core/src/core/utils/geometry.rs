use nalgebra::{Point3, Vector3};

/// Mean of a set of points, `None` when the set is empty.
pub fn centroid<'a>(points: impl IntoIterator<Item = &'a Point3<f64>>) -> Option<Point3<f64>> {
    let mut sum = Vector3::zeros();
    let mut count = 0usize;
    for p in points {
        sum += p.coords;
        count += 1;
    }
    (count > 0).then(|| Point3::from(sum / count as f64))
}

pub fn squared_distance(a: &Point3<f64>, b: &Point3<f64>) -> f64 {
    (a - b).norm_squared()
}

pub fn to_array(p: &Point3<f64>) -> [f64; 3] {
    [p.x, p.y, p.z]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centroid_of_empty_set_is_none() {
        let points: Vec<Point3<f64>> = Vec::new();
        assert!(centroid(&points).is_none());
    }

    #[test]
    fn centroid_averages_coordinates() {
        let points = [Point3::new(0.0, 0.0, 0.0), Point3::new(4.0, -2.0, 6.0)];
        assert_eq!(centroid(&points), Some(Point3::new(2.0, -1.0, 3.0)));
    }

    #[test]
    fn squared_distance_matches_norm() {
        let a = Point3::new(1.0, 2.0, 3.0);
        let b = Point3::new(4.0, 6.0, 3.0);
        assert_eq!(squared_distance(&a, &b), 25.0);
        assert_eq!(to_array(&a), [1.0, 2.0, 3.0]);
    }
}
