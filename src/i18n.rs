// ==========================================
// 分批导入引擎 - 消息目录
// ==========================================
// 目录文件: locales/zh-CN.yml（默认）、locales/en.yml
// rust_i18n::i18n! 宏在 lib.rs 中初始化
// ==========================================

/// 当前语言代码
pub fn current_locale() -> String {
    rust_i18n::locale().to_string()
}

/// 切换语言（"zh-CN" / "en"），进程级全局
pub fn set_locale(locale: &str) {
    rust_i18n::set_locale(locale);
}

/// 按 key 取文案
///
/// ```no_run
/// use batch_import::i18n::t;
/// let text = t("log.import_success");
/// ```
pub fn t(key: &str) -> String {
    rust_i18n::t!(key).to_string()
}

/// 按 key 取文案并替换 `%{name}` 占位符
pub fn t_with_args(key: &str, args: &[(&str, &str)]) -> String {
    args.iter().fold(t(key), |text, (name, value)| {
        text.replace(&format!("%{{{}}}", name), value)
    })
}

/// 适配器显示名，目录中没有的适配器原样返回
pub fn profile_display_name(adapter: &str) -> String {
    let key = format!("profiles.{}", adapter);
    let translated = t(&key);
    // 缺失的 key 会被原样（或带 locale 前缀）返回
    if translated.ends_with(&key) {
        adapter.to_string()
    } else {
        translated
    }
}

/// 批成功日志: "<位置> <适配器显示名> <成功文案>"
pub fn batch_success_message(position: u64, adapter: &str) -> String {
    format!(
        "{} {} {}",
        position,
        profile_display_name(adapter),
        t("log.import_success")
    )
}
