//! 药品名称联想

use clinic_core::utils::contains_ignore_case;

/// 联想结果的最大条数
pub const MAX_SUGGESTIONS: usize = 8;

/// 常用药品名称
pub const MEDICINE_NAMES: &[&str] = &[
    "Amoxicillin",
    "Azithromycin",
    "Paracetamol",
    "Ibuprofen",
    "Cetirizine",
    "Metformin",
    "Omeprazole",
    "Amlodipine",
    "Atorvastatin",
    "Losartan",
    "Ciprofloxacin",
    "Doxycycline",
    "Prednisone",
    "Montelukast",
    "Pantoprazole",
    "Levothyroxine",
    "Lisinopril",
    "Hydrochlorothiazide",
    "Clopidogrel",
    "Aspirin",
    "Diclofenac",
    "Tramadol",
    "Gabapentin",
    "Sertraline",
    "Fluoxetine",
    "Ranitidine",
    "Domperidone",
    "Ondansetron",
    "Salbutamol",
    "Budesonide",
    "Metronidazole",
    "Acyclovir",
    "Clindamycin",
    "Levofloxacin",
    "Rabeprazole",
    "Fexofenadine",
    "Loperamide",
    "ORS",
    "Vitamin D3",
    "Vitamin B12",
    "Iron Supplement",
    "Calcium",
    "Folic Acid",
    "Multivitamin",
];

/// 按输入做不区分大小写的子串匹配；空输入不给联想
pub fn suggest_medicines(query: &str) -> Vec<&'static str> {
    let query = query.trim();
    if query.is_empty() {
        return Vec::new();
    }

    MEDICINE_NAMES
        .iter()
        .copied()
        .filter(|name| contains_ignore_case(name, query))
        .take(MAX_SUGGESTIONS)
        .collect()
}
