//! Tabla periódica reducida: símbolo, número atómico, masa promedio, grupo y
//! valencias por defecto.
//!
//! Las valencias vacías significan "sin comprobación" (metales de
//! transición); esos átomos nunca reciben hidrógenos implícitos.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Element {
    pub symbol: &'static str,
    pub number: u8,
    pub weight: f64,
    pub group: u8,
    pub valences: &'static [u8],
}

const TABLE: &[Element] = &[Element { symbol: "H", number: 1, weight: 1.008, group: 1, valences: &[1] },
                            Element { symbol: "Li", number: 3, weight: 6.94, group: 1, valences: &[1] },
                            Element { symbol: "B", number: 5, weight: 10.81, group: 13, valences: &[3] },
                            Element { symbol: "C", number: 6, weight: 12.011, group: 14, valences: &[4] },
                            Element { symbol: "N", number: 7, weight: 14.007, group: 15, valences: &[3, 5] },
                            Element { symbol: "O", number: 8, weight: 15.999, group: 16, valences: &[2] },
                            Element { symbol: "F", number: 9, weight: 18.998, group: 17, valences: &[1] },
                            Element { symbol: "Na", number: 11, weight: 22.990, group: 1, valences: &[1] },
                            Element { symbol: "Mg", number: 12, weight: 24.305, group: 2, valences: &[2] },
                            Element { symbol: "Al", number: 13, weight: 26.982, group: 13, valences: &[3] },
                            Element { symbol: "Si", number: 14, weight: 28.085, group: 14, valences: &[4] },
                            Element { symbol: "P", number: 15, weight: 30.974, group: 15, valences: &[3, 5] },
                            Element { symbol: "S", number: 16, weight: 32.067, group: 16, valences: &[2, 4, 6] },
                            Element { symbol: "Cl", number: 17, weight: 35.453, group: 17, valences: &[1] },
                            Element { symbol: "K", number: 19, weight: 39.098, group: 1, valences: &[1] },
                            Element { symbol: "Ca", number: 20, weight: 40.078, group: 2, valences: &[2] },
                            Element { symbol: "Fe", number: 26, weight: 55.845, group: 8, valences: &[] },
                            Element { symbol: "Cu", number: 29, weight: 63.546, group: 11, valences: &[] },
                            Element { symbol: "Zn", number: 30, weight: 65.38, group: 12, valences: &[] },
                            Element { symbol: "As", number: 33, weight: 74.922, group: 15, valences: &[3, 5] },
                            Element { symbol: "Se", number: 34, weight: 78.971, group: 16, valences: &[2, 4, 6] },
                            Element { symbol: "Br", number: 35, weight: 79.904, group: 17, valences: &[1] },
                            Element { symbol: "Sn", number: 50, weight: 118.71, group: 14, valences: &[2, 4] },
                            Element { symbol: "I", number: 53, weight: 126.904, group: 17, valences: &[1, 3, 5] },
                            Element { symbol: "Pt", number: 78, weight: 195.084, group: 10, valences: &[] }];

/// Elementos con parámetros de descriptores (LogP, TPSA, QED).
const DESCRIPTOR_ELEMENTS: &[u8] = &[1, 5, 6, 7, 8, 9, 14, 15, 16, 17, 34, 35, 53];

/// Elementos que pueden escribirse en minúscula (aromáticos).
const AROMATIC_CAPABLE: &[u8] = &[5, 6, 7, 8, 15, 16, 33, 34];

/// Subconjunto orgánico: se escribe sin corchetes cuando el conteo de H
/// coincide con el implícito.
const ORGANIC_SUBSET: &[u8] = &[5, 6, 7, 8, 9, 15, 16, 17, 35, 53];

pub fn by_symbol(symbol: &str) -> Option<&'static Element> {
    TABLE.iter().find(|e| e.symbol == symbol)
}

pub fn by_number(number: u8) -> Option<&'static Element> {
    TABLE.iter().find(|e| e.number == number)
}

pub fn symbol(number: u8) -> &'static str {
    by_number(number).map(|e| e.symbol).unwrap_or("*")
}

pub fn has_descriptor_parameters(number: u8) -> bool {
    DESCRIPTOR_ELEMENTS.contains(&number)
}

pub fn aromatic_capable(number: u8) -> bool {
    AROMATIC_CAPABLE.contains(&number)
}

pub fn in_organic_subset(number: u8) -> bool {
    ORGANIC_SUBSET.contains(&number)
}

/// Valencias permitidas ajustadas por carga formal.
///
/// Grupos 15-17 ganan valencia con carga positiva (N+ ~ C), los grupos 1, 2
/// y 13 la pierden, el grupo 14 pierde una unidad por cada carga de
/// cualquier signo. Un vector vacío indica "sin restricción".
pub fn allowed_valences(number: u8, charge: i8) -> Vec<u8> {
    let Some(element) = by_number(number) else {
        return Vec::new();
    };
    let charge = i16::from(charge);
    let shift = match element.group {
        15..=17 => charge,
        1 | 2 | 13 => -charge,
        14 => -charge.abs(),
        _ => 0,
    };
    element.valences
           .iter()
           .filter_map(|v| u8::try_from(i16::from(*v) + shift).ok())
           .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charged_valences_follow_isoelectronic_neighbours() {
        assert_eq!(allowed_valences(7, 1), vec![4, 6]);
        assert_eq!(allowed_valences(8, -1), vec![1]);
        assert_eq!(allowed_valences(6, -1), vec![3]);
        assert_eq!(allowed_valences(5, -1), vec![4]);
        assert_eq!(allowed_valences(11, 1), vec![0]);
        assert!(allowed_valences(26, 2).is_empty());
    }

    #[test]
    fn lookup_by_symbol_and_number_agree() {
        let cl = by_symbol("Cl").expect("cloro");
        assert_eq!(cl.number, 17);
        assert_eq!(symbol(17), "Cl");
        assert!(by_symbol("Xx").is_none());
    }
}
