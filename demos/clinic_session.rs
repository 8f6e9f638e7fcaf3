//! 门诊工作台演示程序
//!
//! 使用内存版外部服务走一遍医生的一次会话：查看队列、推进就诊、套用模板开方、处理通知

use chrono::NaiveDate;
use clinic::admin::{config::ConfigManager, init_logging, ClinicWorkbench};
use clinic::core::{
    CourseDuration, Encounter, EncounterStatus, Frequency, MedicineEntry, NoticeLog,
    NotificationRecord, PatientSnapshot,
};
use clinic::integration::InMemoryClinicService;
use clinic::prescription::suggest_medicines;
use clinic::storage::InMemoryTemplateStore;
use clinic::workflow::{NotificationFilter, QueueFilter};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConfigManager::load_config(None)?;
    init_logging(&config.logging)?;

    println!("🏥 门诊工作台演示\n");

    let service = Arc::new(
        InMemoryClinicService::new()
            .with_encounters(sample_encounters())
            .with_notifications(sample_notifications()),
    );
    let notices = Arc::new(NoticeLog::new());
    let workbench = ClinicWorkbench::with_template_store(
        config,
        service.clone(),
        notices.clone(),
        Arc::new(InMemoryTemplateStore::new()),
    );

    // 1. 拉取队列
    workbench.queue().refresh().await?;
    workbench.notifications().refresh_unread_count().await?;
    print_queue(&workbench).await;

    // 2. 推进就诊
    for id in [3, 3, 1] {
        if let Err(e) = workbench.queue().advance(id).await {
            println!("⚠️  就诊 {} 无法推进: {}", id, e);
        }
    }
    for notice in notices.drain() {
        println!("🔔 {:?}: {}", notice.kind, notice.message);
    }
    print_queue(&workbench).await;

    // 3. 开方
    let mut composer = workbench.open_composer(3).await?;
    {
        let catalog = workbench.catalog().lock().await;
        if let Some(template) = catalog.get("common_cold") {
            composer.toggle_template(template)?;
        }
    }
    println!("\n💊 输入 \"cet\" 的药品联想: {:?}", suggest_medicines("cet"));
    composer.add_medicine(
        MedicineEntry::new("Vitamin D3", "1000IU", Frequency::OnceDaily, CourseDuration::ThirtyDays)
            .with_instructions("After breakfast"),
    )?;
    composer.draft_mut().follow_up_date = NaiveDate::from_ymd_opt(2026, 10, 23);

    println!("📝 草稿诊断: {}", composer.draft().diagnosis);
    for medicine in composer.draft().medicines() {
        println!(
            "   - {} {} {} / {}",
            medicine.name, medicine.dosage, medicine.frequency, medicine.duration
        );
    }

    {
        let mut catalog = workbench.catalog().lock().await;
        let saved = catalog.save_draft_as_template(Some("Cold with low vitamin D"), composer.draft())?;
        println!("📚 已保存模板 {} ({} 种药品)", saved.name, saved.medicines.len());
    }

    let status = composer.submit(true).await?;
    println!("✅ 处方已提交，状态 {:?}", status);

    // 4. 通知
    let update = workbench.notifications().mark_read(1).await;
    println!(
        "\n📬 标记已读后未读数 {}（远端确认: {}）",
        update.unread_after, update.remote_confirmed
    );
    workbench.notifications().load_notifications().await?;
    for record in workbench.notifications().page(NotificationFilter::Unread).await {
        println!("   未读: {}", record.title.unwrap_or_default());
    }

    for notice in notices.drain() {
        println!("🔔 {:?}: {}", notice.kind, notice.message);
    }

    let report = workbench.status_report().await;
    println!("\n📊 工作台状态: {}", summarize(&report));

    Ok(())
}

async fn print_queue(workbench: &ClinicWorkbench) {
    let counts = workbench.queue().counts().await;
    println!(
        "\n📋 今日队列 共 {} 人，候诊 {}，接诊中 {}，已完成 {}",
        counts.total, counts.waiting, counts.in_consultation, counts.completed
    );

    for encounter in workbench.queue().view(QueueFilter::All, "").await {
        let action = workbench
            .queue()
            .next_action(encounter.id)
            .await
            .map(|event| event.action_label())
            .unwrap_or("-");
        println!(
            "   #{} {:<16} {:<10} {:<16} [{}]",
            encounter.id,
            encounter.patient_name(),
            encounter.visit_type.as_deref().unwrap_or(""),
            encounter.status.label(),
            action
        );
    }
}

fn summarize(report: &clinic::admin::WorkbenchStatus) -> String {
    format!(
        "queue={} unread={} templates={} refreshing={}",
        report.queue.total, report.unread_notifications, report.templates, report.refreshing
    )
}

fn sample_encounters() -> Vec<Encounter> {
    let patients = [
        (1, "Sita", "Thapa", "New", EncounterStatus::CheckedIn, 9),
        (2, "Hari", "Adhikari", "Followup", EncounterStatus::Booked, 10),
        (3, "Maya", "Gurung", "Emergency", EncounterStatus::InConsultation, 11),
        (4, "Bikash", "Rai", "New", EncounterStatus::Completed, 8),
    ];

    patients
        .into_iter()
        .filter_map(|(id, first, last, visit_type, status, hour)| {
            Some(Encounter {
                id,
                patient: PatientSnapshot {
                    patient_id: 1000 + id,
                    first_name: Some(first.to_string()),
                    last_name: Some(last.to_string()),
                    patient_code: Some(format!("PT-{:04}", id)),
                    ..Default::default()
                },
                scheduled_at: NaiveDate::from_ymd_opt(2026, 10, 16)?.and_hms_opt(hour, 0, 0)?,
                visit_type: Some(visit_type.to_string()),
                status,
                reason: None,
            })
        })
        .collect()
}

fn sample_notifications() -> Vec<NotificationRecord> {
    ["CBC result ready", "Pharmacy dispensed prescription"]
        .iter()
        .enumerate()
        .map(|(i, title)| NotificationRecord {
            notification_id: i as i64 + 1,
            kind: Some("Info".to_string()),
            title: Some(title.to_string()),
            message: None,
            is_read: false,
            priority: None,
            created_on: None,
        })
        .collect()
}
