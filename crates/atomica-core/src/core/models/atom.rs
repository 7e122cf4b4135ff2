use crate::core::vocab::{is_hydrogen, normalize_element};
use nalgebra::Point3;

/// An atom of a molecular block: its element, the atom name it carried in the source
/// file and its position.
///
/// Atoms are owned by exactly one [`Block`](super::block::Block) and are never mutated
/// after the block is built.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// The atom name from the source file (e.g., "CA", "N1"). Empty for synthetic atoms.
    pub name: String,
    /// The element symbol in canonical capitalization (e.g., "C", "Cl").
    pub element: String,
    /// The 3D coordinates of the atom in Angstroms.
    pub position: Point3<f64>,
}

impl Atom {
    /// Creates a new `Atom`, normalizing the element symbol.
    ///
    /// # Arguments
    ///
    /// * `name` - The atom name.
    /// * `element` - The element symbol, any capitalization.
    /// * `position` - The 3D coordinates of the atom.
    pub fn new(name: &str, element: &str, position: Point3<f64>) -> Self {
        Self {
            name: name.trim().to_string(),
            element: normalize_element(element),
            position,
        }
    }

    pub fn is_hydrogen(&self) -> bool {
        is_hydrogen(&self.element)
    }

    pub fn coords(&self) -> [f64; 3] {
        [self.position.x, self.position.y, self.position.z]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_atom_normalizes_element_and_name() {
        let atom = Atom::new(" CL1", "CL", Point3::new(1.0, 2.0, 3.0));
        assert_eq!(atom.name, "CL1");
        assert_eq!(atom.element, "Cl");
        assert_eq!(atom.coords(), [1.0, 2.0, 3.0]);
    }

    #[test]
    fn hydrogen_detection_uses_element() {
        assert!(Atom::new("H1", "H", Point3::origin()).is_hydrogen());
        assert!(!Atom::new("HG", "Hg", Point3::origin()).is_hydrogen());
    }
}
