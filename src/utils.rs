/// Path processing utility functions / 路径处理工具函数

/// Clean and normalize path / 清理和规范化路径
/// 1. Replace backslashes with forward slashes / 将反斜杠替换为正斜杠
/// 2. Ensure path starts with / / 确保路径以 / 开头
/// 3. Clean . and .. in path / 清理路径中的 . 和 ..
pub fn fix_and_clean_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let path = if path.starts_with('/') {
        path
    } else {
        format!("/{}", path)
    };

    clean_path(&path)
}

/// Drop empty, `.` and `..` segments / 清理路径
fn clean_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();

    for part in path.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                parts.pop();
            }
            _ => parts.push(part),
        }
    }

    if parts.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", parts.join("/"))
    }
}

/// Append an entry name to a directory path / 拼接目录与条目名
pub fn join_path(dir: &str, name: &str) -> String {
    let name = name.trim_start_matches('/');
    if dir.ends_with('/') {
        format!("{}{}", dir, name)
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Check if sub_path is equal to or below path / 判断 sub_path 是否是 path 的子路径
pub fn is_sub_path(path: &str, sub_path: &str) -> bool {
    let path = fix_and_clean_path(path);
    let sub_path = fix_and_clean_path(sub_path);

    if path == sub_path {
        return true;
    }

    let path_with_sep = if path.ends_with('/') {
        path
    } else {
        format!("{}/", path)
    };

    sub_path.starts_with(&path_with_sep)
}

/// Path relative to a mount point / 从挂载路径中提取实际路径
/// mount_path "/cache", raw_path "/cache/documents" -> "/documents"
pub fn get_actual_path(mount_path: &str, raw_path: &str) -> String {
    let mount_path = fix_and_clean_path(mount_path);
    let raw_path = fix_and_clean_path(raw_path);

    let actual = raw_path.strip_prefix(&mount_path).unwrap_or(&raw_path);
    fix_and_clean_path(actual)
}
