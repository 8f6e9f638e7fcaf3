//! 内置处方模板
//!
//! 首次使用时写入模板存储，之后与用户模板一样可以编辑和删除。

use clinic_core::{CourseDuration, Frequency, MedicineEntry, Template};

fn med(
    name: &str,
    dosage: &str,
    frequency: Frequency,
    duration: CourseDuration,
    instructions: &str,
) -> MedicineEntry {
    MedicineEntry::new(name, dosage, frequency, duration).with_instructions(instructions)
}

fn template(id: &str, name: &str, medicines: Vec<MedicineEntry>) -> Template {
    Template {
        id: id.to_string(),
        name: name.to_string(),
        medicines,
    }
}

/// 内置模板，顺序固定
pub fn builtin_templates() -> Vec<Template> {
    use CourseDuration::*;
    use Frequency::*;

    vec![
        template(
            "common_cold",
            "Common Cold / Flu",
            vec![
                med("Paracetamol", "500mg", ThreeTimesDaily, ThreeDays, "After meals with warm water"),
                med("Cetirizine", "10mg", OnceDaily, FiveDays, "At bedtime"),
                med("Amoxicillin", "500mg", ThreeTimesDaily, FiveDays, "If fever persists beyond 3 days"),
            ],
        ),
        template(
            "uti",
            "UTI Treatment",
            vec![
                med("Ciprofloxacin", "500mg", TwiceDaily, SevenDays, "With plenty of water"),
                med("Paracetamol", "500mg", AsNeeded, ThreeDays, "For fever/pain"),
            ],
        ),
        template(
            "hypertension",
            "Hypertension",
            vec![
                med("Amlodipine", "5mg", OnceDaily, Ongoing, "Morning, before breakfast"),
                med("Losartan", "50mg", OnceDaily, Ongoing, "Morning"),
            ],
        ),
        template(
            "diabetes_t2",
            "Type 2 Diabetes",
            vec![med("Metformin", "500mg", TwiceDaily, Ongoing, "After meals")],
        ),
        template(
            "gastritis",
            "Gastritis / GERD",
            vec![
                med("Pantoprazole", "40mg", OnceDaily, FourteenDays, "Before breakfast, empty stomach"),
                med("Domperidone", "10mg", ThreeTimesDaily, SevenDays, "Before meals"),
            ],
        ),
        template(
            "allergy",
            "Allergy / Urticaria",
            vec![
                med("Fexofenadine", "120mg", OnceDaily, SevenDays, "Before meals"),
                med("Montelukast", "10mg", OnceDaily, SevenDays, "At bedtime"),
            ],
        ),
        template(
            "diarrhea",
            "Acute Diarrhea",
            vec![
                med("ORS", "1 packet", AsNeeded, ThreeDays, "Dissolve in 1L water, sip frequently"),
                med("Loperamide", "2mg", AsNeeded, TwoDays, "Max 8mg/day"),
                med("Metronidazole", "400mg", ThreeTimesDaily, FiveDays, "After meals"),
            ],
        ),
    ]
}
