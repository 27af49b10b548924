/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::models::control::RunView;

/// 初始化全局日志订阅者
///
/// `RUST_LOG` 优先；否则默认 `info`，`verbose` 为真时使用 `debug`。
/// 重复调用是安全的（第二次调用会被忽略）。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
///
/// # 参数
/// - `max_concurrent`: 最大并发数
/// - `provider`: 使用的提交能力
pub fn log_startup(max_concurrent: usize, provider: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 批量表单提交模式");
    info!("📊 最大并发数: {}", max_concurrent);
    info!("🔌 提交能力: {}", provider);
    info!("{}", "=".repeat(60));
}

/// 记录目标加载信息
///
/// # 参数
/// - `owner`: 所有者
/// - `total`: 目标链接总数
pub fn log_targets_loaded(owner: &str, total: usize) {
    info!("✓ 所有者 {} 共有 {} 个待处理链接", owner, total);
    info!("💡 按 Ctrl-C 优雅取消，再按一次强制取消\n");
}

/// 打印最终统计信息
pub fn print_final_stats(run: &RunView, results_file: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 运行 {} 统计 - 状态: {}", run.id, run.status);
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!(
        "📄 已处理: {}/{} ({}%)",
        run.processed_count, run.total_links, run.progress_percent
    );
    info!("✅ 成功: {}", run.success_count);
    info!("🟡 部分成功: {}", run.partial_count);
    info!("❌ 失败: {}", run.failed_count);
    info!("⏭️  跳过: {}", run.skipped_count);
    if let Some(notes) = &run.notes {
        info!("📝 备注: {}", notes);
    }
    info!("{}", "=".repeat(60));
    if !results_file.is_empty() {
        info!("\n结果已追加至: {}", results_file);
    }
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text_counts_chars() {
        assert_eq!(truncate_text("abcdef", 3), "abc...");
        assert_eq!(truncate_text("短文本", 10), "短文本");
        assert_eq!(truncate_text("留言内容很长", 2), "留言...");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init(false);
        init(true);
    }
}
